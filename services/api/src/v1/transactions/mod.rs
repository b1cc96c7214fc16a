use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::AppState;

mod categories;
mod create;
mod pending;
mod verify;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create::handler))
        .route("/categories", get(categories::handler))
        .route("/pending", get(pending::handler))
        .route("/:id/verify", patch(verify::handler))
}
