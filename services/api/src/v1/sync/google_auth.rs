use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    errors::{AppError, AppResult},
    extractors::AuthUser,
    sync::oauth::DEFAULT_REDIRECT_URI,
    AppState,
};

pub async fn handler(State(state): State<AppState>, AuthUser(_user): AuthUser) -> AppResult<Json<Value>> {
    let url = state.oauth.authorization_url(DEFAULT_REDIRECT_URI).map_err(|e| {
        tracing::error!("Could not build consent URL: {}", e);
        AppError::internal_server_error("Could not build authorization URL")
    })?;
    Ok(Json(json!({ "url": url })))
}
