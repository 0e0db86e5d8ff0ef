use axum::{
    Json, Router,
    extract::{Multipart, Path, State, multipart::MultipartError},
    routing::get,
};

use crate::{
    dto::products::{ImageUpload, ProductForm, ProductList, ProductUploadForm},
    error::{AppError, AppResult},
    middleware::auth::AdminUser,
    models::Product,
    response::ApiResponse,
    services::product_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(upsert_product))
        .route("/{id}", get(get_product).delete(delete_product))
}

#[utoipa::path(
    get,
    path = "/api/admin/products",
    responses(
        (status = 200, description = "List products with their category", body = ApiResponse<ProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/{id}",
    params(
        ("id" = i32, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    request_body(content = ProductUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Created or updated product", body = ApiResponse<Product>),
        (status = 400, description = "Malformed multipart body"),
        (status = 404, description = "Product to update not found"),
        (status = 409, description = "Name already taken"),
        (status = 422, description = "Model is invalid"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn upsert_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    let (form, image) = read_product_upload(&mut multipart).await?;
    let resp = product_service::upsert_product(&state, form, image).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    params(
        ("id" = i32, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Deleted product"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product is part of an order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, id).await?;
    Ok(Json(resp))
}

async fn read_product_upload(
    multipart: &mut Multipart,
) -> AppResult<(ProductForm, Option<ImageUpload>)> {
    let mut form = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("product") => {
                let text = field.text().await.map_err(bad_multipart)?;
                let parsed = serde_json::from_str::<ProductForm>(&text)
                    .map_err(|e| AppError::BadRequest(format!("invalid product JSON: {e}")))?;
                form = Some(parsed);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                // browsers send an empty part when no file was picked
                if !(file_name.is_empty() && bytes.is_empty()) {
                    image = Some(ImageUpload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    let form = form.ok_or_else(|| AppError::BadRequest("missing `product` field".into()))?;
    Ok((form, image))
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(err.to_string())
}
