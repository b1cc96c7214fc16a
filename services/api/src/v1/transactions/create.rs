use axum::{extract::State, Json};
use postgres_models::models::Transaction;

use crate::{
    errors::{AppError, AppResult},
    extractors::AuthUser,
    ledger::ManualTransaction,
    AppState,
};

/// Records a manual entry. It skips review and is stored as VERIFIED.
pub async fn handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<ManualTransaction>,
) -> AppResult<Json<Transaction>> {
    let new = request
        .into_new_transaction(user.id)
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    let txn = state
        .store
        .insert_transaction(new)
        .await?
        .ok_or_else(|| AppError::conflict("Transaction already recorded"))?;

    tracing::info!(transaction_id = %txn.id, user_id = %user.id, "Manual transaction recorded");
    Ok(Json(txn))
}
