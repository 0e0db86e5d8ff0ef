use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use crate::{
    dto::orders::{CancelledOrder, OrderList, OrderWithDetails, ShipOrderRequest},
    error::AppResult,
    middleware::auth::AdminUser,
    models::OrderHeader,
    payment::Refund,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/in-process", post(start_processing))
        .route("/{id}/ship", post(ship_order))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/refunds", get(list_refunds))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default 20, max 100)"),
        ("status" = Option<String>, Query, description = "Only orders in this status"),
    ),
    responses(
        (status = 200, description = "List orders, newest first", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order header with its detail lines", body = ApiResponse<OrderWithDetails>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<OrderWithDetails>>> {
    let resp = order_service::get_order_details(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/in-process",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order moved to in process", body = ApiResponse<OrderHeader>),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order cannot move to in process"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn start_processing(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<OrderHeader>>> {
    let resp = order_service::set_in_process(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/ship",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    request_body = ShipOrderRequest,
    responses(
        (status = 200, description = "Order shipped", body = ApiResponse<OrderHeader>),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not in process"),
        (status = 422, description = "Carrier or tracking number missing"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn ship_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
    Json(payload): Json<ShipOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderHeader>>> {
    let resp = order_service::set_shipped(&state, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/cancel",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order cancelled, refunded when its payment was approved", body = ApiResponse<CancelledOrder>),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order can no longer be cancelled"),
        (status = 502, description = "Refund rejected by the payment gateway"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<CancelledOrder>>> {
    let resp = order_service::set_cancelled(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}/refunds",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Refunds issued for the order's payment", body = ApiResponse<Vec<Refund>>),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Payment gateway error"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_refunds(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Vec<Refund>>>> {
    let resp = order_service::list_order_refunds(&state, id).await?;
    Ok(Json(resp))
}
