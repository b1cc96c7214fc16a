use axum::{extract::State, http::StatusCode, Json};
use postgres_models::models::TriggerSource;
use serde_json::{json, Value};

use crate::{extractors::AuthUser, AppState};

pub async fn handler(State(state): State<AppState>, AuthUser(user): AuthUser) -> (StatusCode, Json<Value>) {
    tracing::info!(user_id = %user.id, "Manual sync requested");
    state.sync.spawn(user.id, TriggerSource::Manual);
    (StatusCode::ACCEPTED, Json(json!({ "status": "started" })))
}
