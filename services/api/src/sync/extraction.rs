//! Structured extraction of transaction fields from sanitized mail text.

use async_trait::async_trait;
use postgres_models::models::{
    coerce_category_pair, is_storable_amount, AccountType, Category, SubCategory, DEFAULT_CURRENCY, UNKNOWN_MERCHANT,
};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Merchant name carried by the fallback extraction.
pub const FALLBACK_MERCHANT: &str = "UNCATEGORIZED";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub amount: Decimal,
    pub currency: String,
    pub merchant_name: String,
    pub category: Category,
    pub sub_category: SubCategory,
    pub account_type: AccountType,
    /// Set when the model could not be reached or gave nothing usable.
    pub used_fallback: bool,
}

impl Extraction {
    pub fn fallback() -> Self {
        Self {
            amount: Decimal::ZERO,
            currency: DEFAULT_CURRENCY.to_string(),
            merchant_name: FALLBACK_MERCHANT.to_string(),
            category: Category::Uncategorized,
            sub_category: SubCategory::Uncategorized,
            account_type: AccountType::Savings,
            used_fallback: true,
        }
    }
}

/// Turns sanitized text into transaction fields. Never fails: any problem
/// yields `Extraction::fallback()`.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, text: &str) -> Extraction;
}

/// Fields as the model returns them, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawExtraction {
    amount: Option<Value>,
    currency: Option<String>,
    merchant_name: Option<String>,
    category: Option<String>,
    sub_category: Option<String>,
    account_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no API key configured")]
    MissingKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("model returned no choices")]
    EmptyResponse,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Chat-completions extractor backed by Groq.
pub struct GroqExtractor {
    http: Client,
    api_key: Option<String>,
    model: String,
}

impl GroqExtractor {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key,
            model: model.into(),
        })
    }

    async fn complete(&self, text: &str) -> Result<String, ExtractionError> {
        let api_key = self.api_key.as_deref().ok_or(ExtractionError::MissingKey)?;

        let body = json!({
            "model": self.model,
            "temperature": 0.1,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system_prompt() },
                { "role": "user", "content": text },
            ],
        });

        let response = self
            .http
            .post(GROQ_ENDPOINT)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExtractionError::Status(response.status()));
        }

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ExtractionError::EmptyResponse)
    }
}

#[async_trait]
impl Extractor for GroqExtractor {
    async fn extract(&self, text: &str) -> Extraction {
        match self.complete(text).await {
            Ok(content) => parse_model_content(&content).unwrap_or_else(|| {
                tracing::warn!("Extraction model returned unusable content, using fallback");
                Extraction::fallback()
            }),
            Err(ExtractionError::MissingKey) => {
                tracing::debug!("No extraction API key configured, using fallback");
                Extraction::fallback()
            }
            Err(e) => {
                tracing::warn!("Extraction failed, using fallback: {}", e);
                Extraction::fallback()
            }
        }
    }
}

fn system_prompt() -> String {
    let taxonomy = Category::ALL
        .iter()
        .map(|category| {
            let subs: Vec<&str> = category.sub_categories().iter().map(|s| s.as_str()).collect();
            format!("- {}: {}", category, subs.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n");
    let accounts: Vec<&str> = AccountType::ALL.iter().map(|a| a.as_str()).collect();

    format!(
        "You extract a single financial transaction from a bank or payment alert.\n\
         Reply with a JSON object with keys: amount (number), currency (ISO 4217 code), \
         merchant_name (string), category, sub_category, account_type.\n\
         category and sub_category must be one of these pairs:\n{}\n\
         account_type must be one of: {}.\n\
         If the text does not describe a transaction, reply with null.",
        taxonomy,
        accounts.join(", ")
    )
}

/// Validates a model reply. `None` means the reply should be replaced by the
/// fallback extraction.
pub fn parse_model_content(content: &str) -> Option<Extraction> {
    let raw: Option<RawExtraction> = serde_json::from_str(content).ok()?;
    let raw = raw?;

    let amount = match raw.amount {
        None | Some(Value::Null) => Decimal::ZERO,
        Some(value) => parse_amount(&value)?,
    };
    if !is_storable_amount(amount) {
        return None;
    }

    let (category, sub_category) = coerce_category_pair(raw.category.as_deref(), raw.sub_category.as_deref());

    Some(Extraction {
        amount,
        currency: normalize_currency(raw.currency.as_deref()),
        merchant_name: raw
            .merchant_name
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string()),
        category,
        sub_category,
        account_type: raw
            .account_type
            .and_then(|a| AccountType::from_str(a.trim()).ok())
            .unwrap_or(AccountType::Savings),
        used_fallback: false,
    })
}

fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64))
        }
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            Decimal::from_str(cleaned.trim_start_matches('.')).ok()
        }
        _ => None,
    }
}

fn normalize_currency(currency: Option<&str>) -> String {
    match currency.map(|c| c.trim().to_ascii_uppercase()) {
        Some(code) if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => code,
        _ => DEFAULT_CURRENCY.to_string(),
    }
}
