//! Payment processor seam.
//!
//! Only refunds are needed by the admin backend: capture happens in the
//! storefront checkout, outside this service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub mod stripe;

pub use stripe::StripeGateway;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Refund {
    pub id: String,
    pub payment_intent: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected {
        status: u16,
        /// Machine-readable reason, e.g. `charge_already_refunded`.
        code: Option<String>,
        message: String,
    },
}

impl PaymentError {
    pub fn is_already_refunded(&self) -> bool {
        matches!(
            self,
            PaymentError::Rejected { code: Some(code), .. } if code == "charge_already_refunded"
        )
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Refund the full captured amount of a payment intent. Requests with the
    /// same `idempotency_key` are applied once by the processor.
    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: &str,
    ) -> Result<Refund, PaymentError>;

    async fn list_refunds(&self, payment_intent_id: &str) -> Result<Vec<Refund>, PaymentError>;
}
