use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub environment: String,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    /// Shared secret expected in the webhook's `x-pfie-secret` header.
    pub webhook_secret: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub forecast_url: Option<String>,
    pub mail_timeout: Duration,
    pub sync_lock_ttl: Duration,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid port number")?,
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "local".to_string()),
            secret_key: std::env::var("SECRET_KEY")
                .unwrap_or_else(|_| "SECRET_KEY".to_string()),
            access_token_expire_minutes: std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("ACCESS_TOKEN_EXPIRE_MINUTES must be an integer")?,
            webhook_secret: std::env::var("PFIE_SECRET").unwrap_or_default(),
            groq_api_key: optional("GROQ_API_KEY"),
            groq_model: std::env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama3-8b-8192".to_string()),
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: std::env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            forecast_url: optional("FORECAST_URL"),
            mail_timeout: Duration::from_secs(
                std::env::var("MAIL_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("MAIL_TIMEOUT_SECONDS must be an integer")?,
            ),
            sync_lock_ttl: Duration::from_secs(15 * 60),
        })
    }

    /// Local and development environments create missing tables on startup.
    pub fn bootstraps_schema(&self) -> bool {
        matches!(self.environment.as_str(), "local" | "development")
    }
}
