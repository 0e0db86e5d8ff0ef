use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{OrderDetail, OrderHeader},
    payment::Refund,
};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ShipOrderRequest {
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub tracking_number: String,
}

/// One order header with all of its detail lines.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderWithDetails {
    pub order_header: OrderHeader,
    pub order_details: Vec<OrderDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderHeader>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancelledOrder {
    pub order_header: OrderHeader,
    /// Present when the order had an approved payment that was refunded.
    pub refund: Option<Refund>,
}
