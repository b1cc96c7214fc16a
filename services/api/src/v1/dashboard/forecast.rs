use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    errors::AppResult,
    extractors::AuthUser,
    insights::forecast::{confidence, daily_series, HISTORY_WINDOW_DAYS, LOOKAHEAD_DAYS},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub predicted_burden_30d: Decimal,
    pub confidence: &'static str,
    pub description: String,
}

pub async fn handler(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<ForecastResponse>> {
    let since = Utc::now() - Duration::days(HISTORY_WINDOW_DAYS);
    let entries = state.store.expenses_since(user.id, since).await?;
    let history = daily_series(&entries);

    let predicted = state.forecasting.predicted_burden(&history).await;

    Ok(Json(ForecastResponse {
        predicted_burden_30d: predicted,
        confidence: confidence(history.len()),
        description: format!(
            "Projected spend over the next {} days from {} days of history",
            LOOKAHEAD_DAYS,
            history.len()
        ),
    }))
}
