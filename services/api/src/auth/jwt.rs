use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account email
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and validates HS256 access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    expiry_minutes: i64,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, expiry_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            expiry_minutes,
        }
    }

    pub fn issue(&self, email: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            iat: now,
            exp: now + self.expiry_minutes * 60,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    /// Returns the claims, or a short client-safe reason.
    pub fn verify(&self, token: &str) -> Result<Claims, &'static str> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => "Token expired",
            ErrorKind::InvalidSignature => "Invalid signature",
            _ => "Could not validate credentials",
        })
    }
}

/// Pulls the token out of a `Bearer <token>` authorization header.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
