use axum::{extract::State, Json};

use crate::{
    errors::AppResult,
    extractors::AuthUser,
    insights::{liquidity, Liquidity},
    AppState,
};

pub async fn handler(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Liquidity>> {
    let totals = state.store.category_totals(user.id).await?;
    Ok(Json(liquidity(&totals)))
}
