use axum::{routing::post, Router};

use crate::AppState;

mod register;
mod token;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::handler))
        .route("/token", post(token::handler))
}
