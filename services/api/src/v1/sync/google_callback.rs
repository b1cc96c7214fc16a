use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    errors::{AppError, AppResult},
    extractors::AuthUser,
    sync::oauth::DEFAULT_REDIRECT_URI,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Completes mailbox linking by trading the consent code for credentials.
pub async fn handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CallbackRequest>,
) -> AppResult<Json<Value>> {
    let code = request
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing code"))?;
    let redirect_uri = request.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI);

    let credentials = state.oauth.exchange_code(code, redirect_uri).await.map_err(|e| {
        tracing::warn!(user_id = %user.id, "Authorization code exchange failed: {}", e);
        AppError::bad_request("Invalid authorization code")
    })?;

    let encoded = serde_json::to_value(&credentials).map_err(|e| {
        tracing::error!("Could not encode credentials: {}", e);
        AppError::internal_server_error("Could not store credentials")
    })?;
    state.store.update_mail_credentials(user.id, encoded).await?;

    tracing::info!(user_id = %user.id, "Mailbox linked");
    Ok(Json(json!({ "status": "success" })))
}
