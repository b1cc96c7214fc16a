use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use postgres_models::models::NewUser;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::hash_password,
    errors::{AppError, AppResult},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<Json<UserResponse>> {
    let email = request.email.trim().to_lowercase();
    if email.len() > 255 || !email.contains('@') {
        return Err(AppError::bad_request("Invalid email address"));
    }
    if request.password.is_empty() {
        return Err(AppError::bad_request("Password must not be empty"));
    }

    let hashed = hash_password(&request.password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        AppError::internal_server_error("Could not register user")
    })?;

    let user = state
        .store
        .create_user(NewUser::new(email, hashed))
        .await?
        .ok_or_else(|| AppError::bad_request("User with this email already exists"))?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        is_active: user.is_active,
        created_at: user.created_at,
    }))
}
