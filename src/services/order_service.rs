use chrono::Utc;

use crate::{
    dto::orders::{CancelledOrder, OrderList, OrderWithDetails, ShipOrderRequest},
    error::{AppError, AppResult},
    models::{OrderHeader, OrderStatus, PaymentStatus},
    payment::Refund,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
    store::{OrderFilter, UnitOfWork},
};

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let filter = OrderFilter {
        status: query.status,
        limit,
        offset,
    };

    let uow = state.store.begin().await?;
    let (items, total) = uow.order_headers().list(&filter).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order_details(
    state: &AppState,
    order_id: i32,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    let uow = state.store.begin().await?;
    let order_header = uow
        .order_headers()
        .get(order_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let order_details = uow.order_details().list_by_order(order_header.id).await?;

    Ok(ApiResponse::success(
        "Order found",
        OrderWithDetails {
            order_header,
            order_details,
        },
        Some(Meta::empty()),
    ))
}

pub async fn set_in_process(
    state: &AppState,
    order_id: i32,
) -> AppResult<ApiResponse<OrderHeader>> {
    let mut uow = state.store.begin().await?;
    let header = load_for_transition(uow.as_ref(), order_id, OrderStatus::InProcess).await?;

    uow.order_headers()
        .update_status(header.id, OrderStatus::InProcess, None)
        .await?;
    uow.commit().await?;

    tracing::info!(order_id, from = %header.order_status, "order in process");

    Ok(ApiResponse::success(
        "Order in process",
        OrderHeader {
            order_status: OrderStatus::InProcess,
            ..header
        },
        Some(Meta::empty()),
    ))
}

pub async fn set_shipped(
    state: &AppState,
    order_id: i32,
    payload: ShipOrderRequest,
) -> AppResult<ApiResponse<OrderHeader>> {
    let carrier = payload.carrier.trim();
    let tracking_number = payload.tracking_number.trim();
    if carrier.is_empty() {
        return Err(AppError::Validation("carrier is required".into()));
    }
    if tracking_number.is_empty() {
        return Err(AppError::Validation("tracking number is required".into()));
    }

    let mut uow = state.store.begin().await?;
    let mut header = load_for_transition(uow.as_ref(), order_id, OrderStatus::Shipped).await?;

    header.carrier = Some(carrier.to_string());
    header.tracking_number = Some(tracking_number.to_string());
    header.order_status = OrderStatus::Shipped;
    header.shipping_date = Some(Utc::now());

    // Full record write so the shipping fields land together with the status.
    let header = uow.order_headers().update(header).await?;
    uow.commit().await?;

    tracing::info!(order_id, carrier, tracking_number, "order shipped");

    Ok(ApiResponse::success(
        "Order shipped",
        header,
        Some(Meta::empty()),
    ))
}

/// Cancels the order, refunding it first when its payment was approved.
///
/// The order is read in one unit of work and written in another, so no
/// transaction stays open while the gateway works; the transition is checked
/// again before the write. A refund failure aborts the cancellation and
/// nothing is written. A charge the processor reports as already refunded
/// counts as refunded.
///
/// If the refund succeeds but the write fails, the refund stands while the
/// order keeps its old status. Repeating the cancellation completes it
/// without a second refund: the processor replays the per-order idempotency
/// key while it remembers it, and answers "already refunded" after that.
pub async fn set_cancelled(
    state: &AppState,
    order_id: i32,
) -> AppResult<ApiResponse<CancelledOrder>> {
    let header = {
        let uow = state.store.begin().await?;
        let header = load_for_transition(uow.as_ref(), order_id, OrderStatus::Cancelled).await?;
        header
    };

    let refunded = header.payment_status == PaymentStatus::Approved;
    let refund = if refunded {
        issue_refund(state, &header).await?
    } else {
        None
    };
    let refund_id = refund.as_ref().map(|r| r.id.clone());

    let mut uow = state.store.begin().await?;
    let current = load_for_transition(uow.as_ref(), order_id, OrderStatus::Cancelled)
        .await
        .inspect_err(|err| {
            if refunded {
                tracing::error!(
                    order_id,
                    ?refund_id,
                    error = %err,
                    "refund issued but order can no longer be cancelled"
                );
            }
        })?;

    let payment_status = refunded.then_some(PaymentStatus::Refunded);
    uow.order_headers()
        .update_status(current.id, OrderStatus::Cancelled, payment_status)
        .await?;

    if let Err(err) = uow.commit().await {
        if refunded {
            tracing::error!(
                order_id,
                ?refund_id,
                error = %err,
                "refund issued but cancellation was not saved"
            );
        }
        return Err(err);
    }

    tracing::info!(order_id, refunded, "order cancelled");

    Ok(ApiResponse::success(
        "Order cancelled",
        CancelledOrder {
            order_header: OrderHeader {
                order_status: OrderStatus::Cancelled,
                payment_status: payment_status.unwrap_or(current.payment_status),
                ..current
            },
            refund,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_order_refunds(
    state: &AppState,
    order_id: i32,
) -> AppResult<ApiResponse<Vec<Refund>>> {
    let uow = state.store.begin().await?;
    let header = uow
        .order_headers()
        .get(order_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let refunds = match header.payment_intent_id.as_deref() {
        Some(payment_intent_id) => state.payments.list_refunds(payment_intent_id).await?,
        None => Vec::new(),
    };

    let meta = Meta::total(refunds.len());
    Ok(ApiResponse::success("Refunds", refunds, Some(meta)))
}

pub fn refund_idempotency_key(order_id: i32) -> String {
    format!("order-{order_id}-cancel")
}

/// `None` when the processor reports the charge as refunded already.
async fn issue_refund(state: &AppState, header: &OrderHeader) -> AppResult<Option<Refund>> {
    let order_id = header.id;
    let payment_intent_id = header.payment_intent_id.as_deref().ok_or_else(|| {
        AppError::Conflict(format!(
            "order {order_id} has an approved payment but no payment intent"
        ))
    })?;

    match state
        .payments
        .create_refund(payment_intent_id, &refund_idempotency_key(order_id))
        .await
    {
        Ok(refund) => Ok(Some(refund)),
        Err(err) if err.is_already_refunded() => {
            tracing::warn!(order_id, payment_intent_id, "charge was already refunded");
            Ok(None)
        }
        Err(err) => {
            tracing::error!(order_id, error = %err, "refund failed, order left unchanged");
            Err(err.into())
        }
    }
}

async fn load_for_transition(
    uow: &dyn UnitOfWork,
    order_id: i32,
    next: OrderStatus,
) -> AppResult<OrderHeader> {
    let header = uow
        .order_headers()
        .get(order_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !header.order_status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "order {order_id} cannot move from {} to {next}",
            header.order_status
        )));
    }
    Ok(header)
}
