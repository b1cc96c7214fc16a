use axum::{routing::get, Router};

use crate::AppState;

mod forecast;
mod investments;
mod liquidity;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/liquidity", get(liquidity::handler))
        .route("/investments", get(investments::handler))
        .route("/forecast", get(forecast::handler))
}
