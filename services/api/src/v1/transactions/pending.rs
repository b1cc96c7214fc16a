use axum::{
    extract::{Query, State},
    Json,
};
use postgres_models::models::Transaction;
use serde::Deserialize;

use crate::{errors::AppResult, extractors::AuthUser, AppState};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// The caller's pending transactions, newest first.
pub async fn handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<Transaction>>> {
    let skip = page.skip.unwrap_or(0).max(0);
    let limit = page.limit.unwrap_or(DEFAULT_LIMIT).clamp(0, MAX_LIMIT);

    let pending = state.store.pending_transactions(user.id, skip, limit).await?;
    Ok(Json(pending))
}
