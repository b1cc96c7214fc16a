use crate::{auth::extract_bearer_token, errors::AppError, AppState};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use postgres_models::models::User;

/// The account behind a valid bearer token.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let token = extract_bearer_token(header).ok_or_else(|| AppError::unauthorized("Not authenticated"))?;
        let claims = app_state.tokens.verify(token).map_err(AppError::unauthorized)?;

        let user = app_state
            .store
            .find_user_by_email(&claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("Could not validate credentials"))?;
        if !user.is_active {
            return Err(AppError::unauthorized("Inactive user"));
        }

        Ok(AuthUser(user))
    }
}
