use axum::Router;

use crate::AppState;

mod auth;
mod dashboard;
mod sync;
mod transactions;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/transactions", transactions::router())
        .nest("/sync", sync::router())
        .nest("/dashboard", dashboard::router())
}
