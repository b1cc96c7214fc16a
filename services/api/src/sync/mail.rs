//! Mailbox access: fetching candidate transaction alerts for a user.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use postgres_models::models::{MailCredentials, User};
use postgres_models::{DbError, Store};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::oauth::{GoogleOAuth, OAuthError};

const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const ALERT_QUERY: &str = "spent OR debited OR transaction OR alert OR paid";
const MAX_RESULTS: u32 = 20;
const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub id: String,
    /// Provider-assigned receive time, as the provider encodes it.
    pub internal_date: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub snippet: String,
    pub body: String,
}

impl MailMessage {
    /// Body when present, otherwise the snippet.
    pub fn text(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.snippet
        } else {
            &self.body
        }
    }
}

/// Source of new messages for a user. Failures are logged and yield an
/// empty list; they never abort a sync run.
#[async_trait]
pub trait MailSource: Send + Sync {
    async fn fetch_new(&self, user: &User, since: Option<DateTime<Utc>>) -> Vec<MailMessage>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mailbox request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mailbox returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("credential refresh failed: {0}")]
    Refresh(#[from] OAuthError),

    #[error("failed to persist refreshed credentials: {0}")]
    Store(#[from] DbError),

    #[error("failed to encode credentials: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    #[serde(default)]
    internal_date: String,
    #[serde(default)]
    snippet: String,
    payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartBody {
    pub data: Option<String>,
}

/// Gmail REST client acting with the user's stored OAuth credentials.
pub struct GmailSource {
    http: Client,
    oauth: Arc<GoogleOAuth>,
    store: Arc<dyn Store>,
}

impl GmailSource {
    pub fn new(oauth: Arc<GoogleOAuth>, store: Arc<dyn Store>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, oauth, store })
    }

    async fn fresh_credentials(&self, user: &User, credentials: MailCredentials) -> Result<MailCredentials, MailError> {
        if !credentials.is_expired(Utc::now(), EXPIRY_SKEW_SECONDS) {
            return Ok(credentials);
        }

        tracing::debug!(user_id = %user.id, "Refreshing mailbox credentials");
        let refreshed = self.oauth.refresh(&credentials).await?;
        self.store
            .update_mail_credentials(user.id, serde_json::to_value(&refreshed)?)
            .await?;
        Ok(refreshed)
    }

    async fn try_fetch(&self, user: &User, since: Option<DateTime<Utc>>) -> Result<Vec<MailMessage>, MailError> {
        let Some(credentials) = user.mail_credentials() else {
            tracing::debug!(user_id = %user.id, "No mailbox linked");
            return Ok(Vec::new());
        };
        let credentials = self.fresh_credentials(user, credentials).await?;

        let query = search_query(since);
        let max_results = MAX_RESULTS.to_string();
        let list: MessageList = self
            .get(
                &credentials,
                &format!("{}/messages", GMAIL_API),
                &[("q", query.as_str()), ("maxResults", max_results.as_str())],
            )
            .await?;

        let mut messages = Vec::with_capacity(list.messages.len());
        for message_ref in list.messages {
            let message: GmailMessage = self
                .get(&credentials, &format!("{}/messages/{}", GMAIL_API, message_ref.id), &[("format", "full")])
                .await?;
            messages.push(into_mail_message(message));
        }
        Ok(messages)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        credentials: &MailCredentials,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MailError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&credentials.token)
            .query(query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MailError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MailSource for GmailSource {
    async fn fetch_new(&self, user: &User, since: Option<DateTime<Utc>>) -> Vec<MailMessage> {
        match self.try_fetch(user, since).await {
            Ok(messages) => {
                tracing::info!(user_id = %user.id, count = messages.len(), "Fetched candidate messages");
                messages
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, "Mailbox fetch failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Keyword search, bounded below by the watermark when there is one.
pub fn search_query(since: Option<DateTime<Utc>>) -> String {
    match since {
        Some(since) => format!("{} after:{}", ALERT_QUERY, since.timestamp()),
        None => ALERT_QUERY.to_string(),
    }
}

fn into_mail_message(message: GmailMessage) -> MailMessage {
    let timestamp = message
        .internal_date
        .parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single());
    let body = message
        .payload
        .as_ref()
        .and_then(select_body)
        .unwrap_or_default();

    MailMessage {
        id: message.id,
        internal_date: message.internal_date,
        timestamp,
        snippet: message.snippet,
        body,
    }
}

/// Best plain-text body of a message: the first `text/plain` part anywhere
/// in the tree, else the top-level body.
pub fn select_body(payload: &MessagePart) -> Option<String> {
    find_plain_text(payload).or_else(|| payload.body.as_ref().and_then(decode_body))
}

fn find_plain_text(part: &MessagePart) -> Option<String> {
    if part.mime_type == "text/plain" {
        if let Some(text) = part.body.as_ref().and_then(decode_body) {
            return Some(text);
        }
    }
    part.parts.iter().find_map(find_plain_text)
}

fn decode_body(body: &PartBody) -> Option<String> {
    let data = body.data.as_deref()?;
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    (!text.trim().is_empty()).then_some(text)
}
