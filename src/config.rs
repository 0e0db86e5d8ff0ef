use std::{env, path::PathBuf};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub image_root: PathBuf,
    pub max_upload_bytes: usize,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub secret_key: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = database_url_from_env()?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let image_root = env::var("IMAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("wwwroot"));
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(5 * 1024 * 1024);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            image_root,
            max_upload_bytes,
            payment: PaymentConfig::from_env()?,
        })
    }
}

/// The migrate and seed tools only need the database.
pub fn database_url_from_env() -> anyhow::Result<String> {
    env::var("DATABASE_URL").context("DATABASE_URL is not set")
}

impl PaymentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let secret_key =
            env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY is not set")?;
        let api_base = env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| "https://api.stripe.com".to_string());
        let timeout_secs = env::var("PAYMENT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        Ok(Self {
            secret_key,
            api_base,
            timeout_secs,
        })
    }
}
