use crate::schema::users;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub gmail_credentials: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub fn new(email: String, hashed_password: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            hashed_password,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// OAuth credentials for the user's linked mailbox, stored as an opaque JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailCredentials {
    pub token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl MailCredentials {
    /// Treats credentials expiring within `skew_seconds` as already expired.
    pub fn is_expired(&self, now: DateTime<Utc>, skew_seconds: i64) -> bool {
        match self.expiry {
            Some(expiry) => expiry - chrono::Duration::seconds(skew_seconds) <= now,
            None => false,
        }
    }
}

impl User {
    /// Decodes the stored mailbox credentials; a malformed blob counts as unlinked.
    pub fn mail_credentials(&self) -> Option<MailCredentials> {
        let raw = self.gmail_credentials.as_ref()?;
        match serde_json::from_value(raw.clone()) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!(user_id = %self.id, "Stored mailbox credentials are malformed: {}", e);
                None
            }
        }
    }
}
