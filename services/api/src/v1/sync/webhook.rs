use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use postgres_models::models::TriggerSource;
use serde_json::{json, Value};

use crate::{
    errors::{AppError, AppResult},
    AppState,
};

pub const SECRET_HEADER: &str = "x-pfie-secret";

/// Mailbox push notification. Acknowledges quickly and syncs in the background.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Value>)> {
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if state.webhook_secret.is_empty() || provided != Some(&*state.webhook_secret) {
        tracing::warn!("Webhook call with invalid secret");
        return Err(AppError::unauthorized("Invalid webhook secret"));
    }

    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let Some(email) = payload
        .get("emailAddress")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|e| !e.is_empty())
    else {
        return Ok(accepted("ignored"));
    };

    let Some(user) = state.store.find_user_by_email(&email.to_lowercase()).await? else {
        tracing::info!("Webhook for unregistered mailbox");
        return Ok(accepted("user_not_found"));
    };

    state.sync.spawn(user.id, TriggerSource::Webhook);
    Ok(accepted("accepted"))
}

fn accepted(status: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::ACCEPTED, Json(json!({ "status": status })))
}
