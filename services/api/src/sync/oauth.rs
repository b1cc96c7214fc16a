//! Google OAuth2 helpers for linking a mailbox.

use chrono::{Duration as ChronoDuration, Utc};
use postgres_models::models::MailCredentials;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Redirect used by the browser popup flow when the caller supplies none.
pub const DEFAULT_REDIRECT_URI: &str = "postmessage";

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint rejected the request ({status}): {body}")]
    Rejected { status: reqwest::StatusCode, body: String },

    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("invalid authorization endpoint: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

pub struct GoogleOAuth {
    http: Client,
    client_id: String,
    client_secret: String,
}

impl GoogleOAuth {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            client_id,
            client_secret,
        })
    }

    /// Consent-screen URL requesting offline, read-only mailbox access.
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            AUTH_URI,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", GMAIL_READONLY_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("include_granted_scopes", "true"),
            ],
        )?;
        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<MailCredentials, OAuthError> {
        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;
        Ok(into_credentials(token, None))
    }

    /// Trades the stored refresh token for a fresh access token. Google omits
    /// the refresh token from refresh responses, so the old one is kept.
    pub async fn refresh(&self, credentials: &MailCredentials) -> Result<MailCredentials, OAuthError> {
        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .ok_or(OAuthError::MissingRefreshToken)?;
        let token = self
            .request_token(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .await?;
        Ok(into_credentials(token, credentials.refresh_token.clone()))
    }

    async fn request_token(&self, grant: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self.http.post(TOKEN_URI).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Rejected { status, body });
        }
        Ok(response.json().await?)
    }
}

fn into_credentials(token: TokenResponse, previous_refresh: Option<String>) -> MailCredentials {
    MailCredentials {
        token: token.access_token,
        refresh_token: token.refresh_token.or(previous_refresh),
        expiry: token
            .expires_in
            .map(|seconds| Utc::now() + ChronoDuration::seconds(seconds)),
    }
}
