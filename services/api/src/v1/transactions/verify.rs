use axum::{
    extract::{Path, State},
    Json,
};
use postgres_models::models::{Transaction, Verification, VerifyOutcome};
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    extractors::AuthUser,
    AppState,
};

/// Approves or rejects a pending transaction. Approval also teaches the
/// merchant memory how to name and categorise this merchant.
pub async fn handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(mut request): Json<Verification>,
) -> AppResult<Json<Transaction>> {
    if !request.category.allows(request.sub_category) {
        return Err(AppError::bad_request(format!(
            "Sub-category '{}' does not belong to category '{}'",
            request.sub_category, request.category
        )));
    }
    if request.approved {
        request.merchant_name = request.merchant_name.trim().to_string();
        if request.merchant_name.is_empty() {
            return Err(AppError::bad_request("Merchant name must not be empty"));
        }
    }

    match state.store.verify_transaction(id, user.id, &request).await? {
        VerifyOutcome::Verified(txn) => {
            tracing::info!(transaction_id = %txn.id, status = %txn.status, "Transaction reviewed");
            Ok(Json(txn))
        }
        VerifyOutcome::NotFound => Err(AppError::not_found("Transaction not found")),
        VerifyOutcome::AlreadyFinal(status) => {
            Err(AppError::conflict(format!("Transaction already {}", status)))
        }
    }
}
