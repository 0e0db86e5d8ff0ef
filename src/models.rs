use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub category_id: i32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductWithCategory {
    pub product: Product,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    InProcess,
    Shipped,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::InProcess => "in_process",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Shipped | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Forward-only workflow: Pending/Approved -> InProcess -> Shipped, with
    /// Cancelled reachable from any state that has not shipped yet.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match next {
            OrderStatus::InProcess => {
                matches!(self, OrderStatus::Pending | OrderStatus::Approved)
            }
            OrderStatus::Shipped => matches!(self, OrderStatus::InProcess),
            OrderStatus::Cancelled => !self.is_terminal(),
            OrderStatus::Pending | OrderStatus::Approved | OrderStatus::Refunded => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "approved" => Ok(OrderStatus::Approved),
            "in_process" => Ok(OrderStatus::InProcess),
            "shipped" => Ok(OrderStatus::Shipped),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    ApprovedForDelayedPayment,
    Rejected,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::ApprovedForDelayedPayment => "approved_for_delayed_payment",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "approved" => Ok(PaymentStatus::Approved),
            "approved_for_delayed_payment" => Ok(PaymentStatus::ApprovedForDelayedPayment),
            "rejected" => Ok(PaymentStatus::Rejected),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderHeader {
    pub id: i32,
    pub order_date: DateTime<Utc>,
    pub order_total: i64,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub session_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub shipping_date: Option<DateTime<Utc>>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderDetail {
    pub id: i32,
    pub order_header_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: i64,
}
