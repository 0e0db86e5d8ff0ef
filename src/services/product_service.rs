use crate::{
    dto::products::{ImageUpload, ProductForm, ProductList},
    error::{AppError, AppResult},
    models::Product,
    response::{ApiResponse, Meta},
    state::AppState,
    storage::{ALLOWED_EXTENSIONS, StorageError, generate_file_name, has_allowed_extension},
    store::UnitOfWork,
};

const MAX_NAME_LEN: usize = 200;

pub async fn list_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let uow = state.store.begin().await?;
    let items = uow.products().get_all().await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: i32) -> AppResult<ApiResponse<Product>> {
    let uow = state.store.begin().await?;
    let product = uow.products().get(id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product, None))
}

/// Creates (`id == 0`) or updates a product, optionally replacing its image.
///
/// A new image is written and checked before the row is saved, and the
/// previous file is removed only after the commit. When saving the row fails
/// the new file is removed again, leaving the previous image in place.
pub async fn upsert_product(
    state: &AppState,
    payload: ProductForm,
    image: Option<ImageUpload>,
) -> AppResult<ApiResponse<Product>> {
    let mut product = validate_product(payload)?;
    if let Some(image) = &image {
        validate_image(image)?;
    }

    let mut uow = state.store.begin().await?;
    if uow.categories().get(product.category_id).await?.is_none() {
        return Err(AppError::Validation(format!(
            "category {} does not exist",
            product.category_id
        )));
    }

    let previous_image = if product.id == 0 {
        None
    } else {
        uow.products()
            .get(product.id)
            .await?
            .ok_or(AppError::NotFound)?
            .image_url
    };
    product.image_url = previous_image.clone();

    let new_image = match &image {
        Some(image) => Some(store_image(state, image).await?),
        None => None,
    };
    if let Some(url) = &new_image {
        product.image_url = Some(url.clone());
    }

    let (product, message) = match save_product(uow.as_mut(), product).await {
        Ok(saved) => saved,
        Err(err) => {
            if let Some(url) = &new_image {
                discard_image(state, url).await;
            }
            return Err(err);
        }
    };

    if let (Some(_), Some(previous)) = (&new_image, &previous_image) {
        discard_image(state, previous).await;
    }

    tracing::info!(product_id = product.id, image = ?product.image_url, outcome = message, "product saved");

    Ok(ApiResponse::success(message, product, Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    id: i32,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let mut uow = state.store.begin().await?;
    let product = uow.products().get(id).await?.ok_or(AppError::NotFound)?;

    let order_lines = uow.order_details().count_by_product(product.id).await?;
    if order_lines > 0 {
        return Err(AppError::Conflict(format!(
            "product {id} is referenced by {order_lines} order line(s)"
        )));
    }

    uow.products().delete(&product).await?;
    uow.commit().await?;

    if let Some(url) = &product.image_url {
        discard_image(state, url).await;
    }

    tracing::info!(product_id = id, "product deleted");

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn save_product(
    uow: &mut dyn UnitOfWork,
    product: Product,
) -> AppResult<(Product, &'static str)> {
    let saved = if product.id == 0 {
        (uow.products().add(product).await?, "Product created")
    } else {
        (uow.products().update(product).await?, "Product updated")
    };
    uow.commit().await?;
    Ok(saved)
}

async fn store_image(state: &AppState, image: &ImageUpload) -> AppResult<String> {
    let file_name = generate_file_name(&image.file_name);
    let url = state.images.save(&image.bytes, &file_name).await?;
    if !state.images.exists(&url).await? {
        return Err(StorageError::NotPersisted(url).into());
    }
    Ok(url)
}

/// Best effort: a file that cannot be removed is left behind and logged.
async fn discard_image(state: &AppState, url: &str) {
    match state.images.exists(url).await {
        Ok(true) => {
            if let Err(err) = state.images.delete(url).await {
                tracing::warn!(image = url, error = %err, "failed to remove image file");
            }
        }
        Ok(false) => {}
        Err(err) => tracing::warn!(image = url, error = %err, "failed to check image file"),
    }
}

fn validate_product(payload: ProductForm) -> AppResult<Product> {
    if payload.id < 0 {
        return Err(AppError::Validation("id must not be negative".into()));
    }
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if payload.price < 0 {
        return Err(AppError::Validation("price must not be negative".into()));
    }
    if payload.category_id <= 0 {
        return Err(AppError::Validation("category is required".into()));
    }

    Ok(Product {
        id: payload.id,
        name: name.to_string(),
        description: payload
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        price: payload.price,
        category_id: payload.category_id,
        image_url: None,
    })
}

fn validate_image(image: &ImageUpload) -> AppResult<()> {
    if image.bytes.is_empty() {
        return Err(AppError::Validation("image file is empty".into()));
    }
    if !has_allowed_extension(&image.file_name) {
        return Err(AppError::Validation(format!(
            "image must be one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    Ok(())
}
