use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};

use super::{PaymentError, PaymentGateway, Refund};
use crate::config::PaymentConfig;

/// Refund client for the Stripe REST API (form-encoded requests, JSON replies).
pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct RefundList {
    data: Vec<Refund>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: &str,
    ) -> Result<Refund, PaymentError> {
        tracing::info!(payment_intent_id, "requesting refund");
        let response = self
            .client
            .post(self.url("/v1/refunds"))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key)
            .form(&[
                ("payment_intent", payment_intent_id),
                ("reason", "requested_by_customer"),
            ])
            .send()
            .await?;
        parse_response(response).await
    }

    async fn list_refunds(&self, payment_intent_id: &str) -> Result<Vec<Refund>, PaymentError> {
        let response = self
            .client
            .get(self.url("/v1/refunds"))
            .bearer_auth(&self.secret_key)
            .query(&[("payment_intent", payment_intent_id)])
            .send()
            .await?;
        let list: RefundList = parse_response(response).await?;
        Ok(list.data)
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let (code, message) = match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => (envelope.error.code, envelope.error.message.unwrap_or_default()),
        Err(_) => (
            None,
            status.canonical_reason().unwrap_or("unknown error").to_string(),
        ),
    };
    tracing::warn!(status = status.as_u16(), ?code, %message, "payment gateway rejected request");
    Err(PaymentError::Rejected {
        status: status.as_u16(),
        code,
        message,
    })
}
