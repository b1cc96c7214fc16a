use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

mod google_auth;
mod google_callback;
mod logs;
mod manual;
mod webhook;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/google/auth", get(google_auth::handler))
        .route("/google/callback", post(google_callback::handler))
        .route("/webhook", post(webhook::handler))
        .route("/manual", post(manual::handler))
        .route("/logs", get(logs::handler))
}
