use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ProductWithCategory;

/// Create-or-update payload: `id` 0 (or omitted) creates a new product.
/// The image is never set from here; it comes from the uploaded file.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProductForm {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub category_id: i32,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Multipart body of `POST /api/admin/products`.
#[derive(ToSchema)]
pub struct ProductUploadForm {
    /// JSON-encoded `ProductForm`.
    pub product: String,
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<ProductWithCategory>)]
    pub items: Vec<ProductWithCategory>,
}
