use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Category;

/// Create-or-update payload: `id` 0 (or omitted) creates a new category.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CategoryForm {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryList {
    #[schema(value_type = Vec<Category>)]
    pub items: Vec<Category>,
}
