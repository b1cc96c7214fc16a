//! Account authentication
//!
//! - Argon2id password hashing
//! - HS256 bearer tokens whose subject is the account email

pub mod jwt;
pub mod password;

pub use jwt::{extract_bearer_token, Claims, TokenIssuer};
pub use password::{hash_password, verify_password};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    #[error("Failed to issue token: {0}")]
    Issue(#[from] jsonwebtoken::errors::Error),
}
