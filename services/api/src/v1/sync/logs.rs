use axum::{
    extract::{Query, State},
    Json,
};
use postgres_models::models::SyncLog;
use serde::Deserialize;

use crate::{errors::AppResult, extractors::AuthUser, AppState};

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<i64>,
}

/// The caller's most recent sync runs.
pub async fn handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<Vec<SyncLog>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    Ok(Json(state.store.recent_sync_logs(user.id, limit).await?))
}
