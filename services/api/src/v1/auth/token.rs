use axum::{extract::State, Form, Json};
use serde::{Deserialize, Serialize};

use crate::{
    auth::verify_password,
    errors::{AppError, AppResult},
    AppState,
};

/// OAuth2 password-grant form; `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

pub async fn handler(
    State(state): State<AppState>,
    Form(request): Form<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let email = request.username.trim().to_lowercase();
    let user = state.store.find_user_by_email(&email).await?;

    let authenticated = match &user {
        Some(user) => verify_password(&request.password, &user.hashed_password).unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, "Stored password hash unreadable: {}", e);
            false
        }),
        None => false,
    };
    if !authenticated {
        return Err(AppError::unauthorized("Incorrect username or password"));
    }

    let access_token = state.tokens.issue(&email).map_err(|e| {
        tracing::error!("Token issue failed: {}", e);
        AppError::internal_server_error("Could not issue token")
    })?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}
