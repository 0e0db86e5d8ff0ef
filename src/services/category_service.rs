use crate::{
    dto::categories::{CategoryForm, CategoryList},
    error::{AppError, AppResult},
    models::Category,
    response::{ApiResponse, Meta},
    state::AppState,
};

const MAX_NAME_LEN: usize = 100;

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let uow = state.store.begin().await?;
    let items = uow.categories().get_all().await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("Categories", CategoryList { items }, Some(meta)))
}

pub async fn get_category(state: &AppState, id: i32) -> AppResult<ApiResponse<Category>> {
    let uow = state.store.begin().await?;
    let category = uow.categories().get(id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Category", category, None))
}

pub async fn upsert_category(
    state: &AppState,
    payload: CategoryForm,
) -> AppResult<ApiResponse<Category>> {
    let category = validate_category(payload)?;

    let mut uow = state.store.begin().await?;
    let (category, message) = if category.id == 0 {
        (uow.categories().add(category).await?, "Category created")
    } else {
        (uow.categories().update(category).await?, "Category updated")
    };
    uow.commit().await?;

    tracing::info!(category_id = category.id, outcome = message, "category saved");

    Ok(ApiResponse::success(message, category, Some(Meta::empty())))
}

pub async fn delete_category(
    state: &AppState,
    id: i32,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let mut uow = state.store.begin().await?;
    let category = uow.categories().get(id).await?.ok_or(AppError::NotFound)?;

    let products = uow.products().count_by_category(category.id).await?;
    if products > 0 {
        return Err(AppError::Conflict(format!(
            "category {id} is still used by {products} product(s)"
        )));
    }

    uow.categories().delete(&category).await?;
    uow.commit().await?;

    tracing::info!(category_id = id, "category deleted");

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_category(payload: CategoryForm) -> AppResult<Category> {
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
    Ok(Category {
        id: payload.id,
        name: name.to_string(),
    })
}
