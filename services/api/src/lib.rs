pub mod auth;
pub mod config;
pub mod errors;
pub mod extractors;
pub mod insights;
pub mod ledger;
pub mod sync;
pub mod v1;

use axum::{routing::get, Json, Router};
use postgres_models::{PgStore, Store};
use redis_cache::SyncLock;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::insights::{Forecaster, ForecastingService, HttpForecaster};
use crate::sync::{GmailSource, GoogleOAuth, GroqExtractor, Sanitizer, SyncService};

const FORECAST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sync: Arc<SyncService>,
    pub forecasting: Arc<ForecastingService>,
    pub oauth: Arc<GoogleOAuth>,
    pub tokens: TokenIssuer,
    /// Shared secret for the mailbox webhook. Empty rejects every call.
    pub webhook_secret: Arc<str>,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = postgres_models::create_pool(&config.database_url).await
            .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
        let redis_pool = redis_cache::create_pool(&config.redis_url).await
            .map_err(|e| anyhow::anyhow!("Failed to create Redis pool: {}", e))?;

        if config.bootstraps_schema() {
            postgres_models::bootstrap_schema(&db_pool).await
                .map_err(|e| anyhow::anyhow!("Failed to bootstrap schema: {}", e))?;
            tracing::info!("Database schema ready");
        }

        let store: Arc<dyn Store> = Arc::new(PgStore::new(db_pool));
        let oauth = Arc::new(GoogleOAuth::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            config.mail_timeout,
        )?);
        let mail = Arc::new(GmailSource::new(oauth.clone(), store.clone(), config.mail_timeout)?);
        let extractor = Arc::new(GroqExtractor::new(config.groq_api_key.clone(), config.groq_model.clone())?);
        let sanitizer = Arc::new(Sanitizer::new()?);
        let guard = Arc::new(SyncLock::new(redis_pool, config.sync_lock_ttl));
        let sync = Arc::new(SyncService::new(store.clone(), mail, extractor, sanitizer, guard));

        let model: Option<Arc<dyn Forecaster>> = match &config.forecast_url {
            Some(url) => {
                let forecaster = HttpForecaster::new(url.clone(), FORECAST_TIMEOUT)?;
                Some(Arc::new(forecaster) as Arc<dyn Forecaster>)
            }
            None => {
                tracing::warn!("FORECAST_URL not set, forecasts will be zero");
                None
            }
        };

        Ok(Self {
            store,
            sync,
            forecasting: Arc::new(ForecastingService::new(model)),
            oauth,
            tokens: TokenIssuer::new(config.secret_key.clone(), config.access_token_expire_minutes),
            webhook_secret: Arc::from(config.webhook_secret.as_str()),
        })
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "pfie-api"
    }))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", v1::router())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
