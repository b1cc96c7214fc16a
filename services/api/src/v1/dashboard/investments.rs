use axum::{extract::State, Json};

use crate::{
    errors::AppResult,
    extractors::AuthUser,
    insights::{investments, Investments},
    AppState,
};

pub async fn handler(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Investments>> {
    let totals = state.store.category_totals(user.id).await?;
    Ok(Json(investments(&totals)))
}
