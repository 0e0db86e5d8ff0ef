use std::sync::Arc;

use crate::{payment::PaymentGateway, storage::ImageStore, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub payments: Arc<dyn PaymentGateway>,
    pub images: Arc<dyn ImageStore>,
    pub jwt_secret: Arc<str>,
}
