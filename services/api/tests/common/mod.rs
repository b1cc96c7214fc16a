#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use pfie_api::{
    app,
    auth::{hash_password, TokenIssuer},
    insights::{Forecaster, ForecastingService},
    sync::{Extraction, Extractor, GoogleOAuth, LocalRunGuard, MailMessage, MailSource, Sanitizer, SyncService},
    AppState,
};
use postgres_models::memory::MemoryStore;
use postgres_models::models::{NewUser, User};
use postgres_models::{Store, UserRepository};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const PASSWORD: &str = "correct horse battery staple";

/// Mail source returning the same scripted inbox on every fetch.
#[derive(Default)]
pub struct ScriptedMail {
    messages: Mutex<Vec<MailMessage>>,
    watermarks: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl ScriptedMail {
    pub fn set_inbox(&self, messages: Vec<MailMessage>) {
        *self.messages.lock().unwrap() = messages;
    }

    /// The `since` argument of every fetch so far.
    pub fn watermarks(&self) -> Vec<Option<DateTime<Utc>>> {
        self.watermarks.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSource for ScriptedMail {
    async fn fetch_new(&self, _user: &User, since: Option<DateTime<Utc>>) -> Vec<MailMessage> {
        self.watermarks.lock().unwrap().push(since);
        self.messages.lock().unwrap().clone()
    }
}

/// Extractor answering by substring match on the text it receives.
#[derive(Default)]
pub struct ScriptedExtractor {
    answers: Mutex<Vec<(String, Extraction)>>,
    panic_on: Mutex<Option<String>>,
    seen: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn answer(&self, needle: &str, extraction: Extraction) {
        self.answers.lock().unwrap().push((needle.to_string(), extraction));
    }

    pub fn panic_on(&self, needle: &str) {
        *self.panic_on.lock().unwrap() = Some(needle.to_string());
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(&self, text: &str) -> Extraction {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());

        let should_panic = self
            .panic_on
            .lock()
            .unwrap()
            .as_deref()
            .map_or(false, |needle| text.contains(needle));
        if should_panic {
            panic!("extractor exploded");
        }

        self.answers
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, extraction)| extraction.clone())
            .unwrap_or_else(Extraction::fallback)
    }
}

pub fn message(id: &str, body: &str) -> MailMessage {
    MailMessage {
        id: id.to_string(),
        internal_date: "1709251200000".to_string(),
        timestamp: None,
        snippet: String::new(),
        body: body.to_string(),
    }
}

/// The service wired over in-memory fakes.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mail: Arc<ScriptedMail>,
    pub extractor: Arc<ScriptedExtractor>,
    pub guard: Arc<LocalRunGuard>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_forecaster(None)
    }

    pub fn with_forecaster(model: Option<Arc<dyn Forecaster>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mail = Arc::new(ScriptedMail::default());
        let extractor = Arc::new(ScriptedExtractor::default());
        let guard = Arc::new(LocalRunGuard::new());
        let dyn_store: Arc<dyn Store> = store.clone();

        let sync = SyncService::new(
            dyn_store.clone(),
            mail.clone(),
            extractor.clone(),
            Arc::new(Sanitizer::new().unwrap()),
            guard.clone(),
        );
        let oauth = GoogleOAuth::new("test-client".into(), "test-secret".into(), Duration::from_secs(1)).unwrap();

        let state = AppState {
            store: dyn_store,
            sync: Arc::new(sync),
            forecasting: Arc::new(ForecastingService::new(model)),
            oauth: Arc::new(oauth),
            tokens: TokenIssuer::new("test-jwt-secret", 30),
            webhook_secret: Arc::from(WEBHOOK_SECRET),
        };

        Self {
            state,
            store,
            mail,
            extractor,
            guard,
        }
    }

    pub fn router(&self) -> Router {
        app(self.state.clone())
    }

    pub async fn create_user(&self, email: &str) -> User {
        let hashed = hash_password(PASSWORD).unwrap();
        self.store
            .create_user(NewUser::new(email.to_string(), hashed))
            .await
            .unwrap()
            .unwrap()
    }

    pub fn bearer(&self, email: &str) -> String {
        format!("Bearer {}", self.state.tokens.issue(email).unwrap())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, email: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(email) = email {
            builder = builder.header(header::AUTHORIZATION, self.bearer(email));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, method: Method, uri: &str, email: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(email) = email {
            builder = builder.header(header::AUTHORIZATION, self.bearer(email));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub async fn wait_for_condition<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}
