//! 30-day spend forecasting from the daily expense series.

use async_trait::async_trait;
use chrono::NaiveDate;
use postgres_models::models::{to_money, ExpenseEntry};
use reqwest::Client;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const LOOKAHEAD_DAYS: u32 = 30;
pub const MIN_HISTORY_POINTS: usize = 30;
pub const HISTORY_WINDOW_DAYS: i64 = 90;
/// Above this many points the forecast is reported with high confidence.
pub const HIGH_CONFIDENCE_POINTS: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub ds: NaiveDate,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ds: NaiveDate,
    pub yhat: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("forecast request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("forecast service returned status {0}")]
    Status(reqwest::StatusCode),
}

/// A time-series model that extends a daily series `periods` days ahead.
#[async_trait]
pub trait Forecaster: Send + Sync {
    async fn predict(&self, history: &[DailyPoint], periods: u32) -> Result<Vec<ForecastPoint>, ForecastError>;
}

#[derive(Serialize)]
struct ForecastRequest<'a> {
    history: &'a [DailyPoint],
    periods: u32,
}

#[derive(Deserialize)]
struct ForecastResponse {
    forecast: Vec<ForecastPoint>,
}

/// Forecaster served over HTTP.
pub struct HttpForecaster {
    http: Client,
    url: String,
}

impl HttpForecaster {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl Forecaster for HttpForecaster {
    async fn predict(&self, history: &[DailyPoint], periods: u32) -> Result<Vec<ForecastPoint>, ForecastError> {
        let response = self
            .http
            .post(&self.url)
            .json(&ForecastRequest { history, periods })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ForecastError::Status(response.status()));
        }
        let body: ForecastResponse = response.json().await?;
        Ok(body.forecast)
    }
}

/// Sums expenses per UTC calendar day, oldest first.
pub fn daily_series(entries: &[ExpenseEntry]) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for entry in entries {
        *days.entry(entry.created_at.date_naive()).or_insert(Decimal::ZERO) += entry.amount;
    }
    days.into_iter()
        .map(|(ds, total)| DailyPoint {
            ds,
            y: total.to_f64().unwrap_or_default(),
        })
        .collect()
}

pub struct ForecastingService {
    model: Option<Arc<dyn Forecaster>>,
}

impl ForecastingService {
    /// Without a model every prediction is zero.
    pub fn new(model: Option<Arc<dyn Forecaster>>) -> Self {
        Self { model }
    }

    /// Predicted spend over the next `LOOKAHEAD_DAYS` days. Short histories
    /// and model failures give zero; the result is never negative.
    pub async fn predicted_burden(&self, history: &[DailyPoint]) -> Decimal {
        let Some(model) = &self.model else {
            return to_money(Decimal::ZERO);
        };
        let Some(last_day) = history.last().map(|p| p.ds) else {
            return to_money(Decimal::ZERO);
        };
        if history.len() < MIN_HISTORY_POINTS {
            tracing::debug!(points = history.len(), "Not enough history to forecast");
            return to_money(Decimal::ZERO);
        }

        match model.predict(history, LOOKAHEAD_DAYS).await {
            Ok(points) => future_total(&points, last_day),
            Err(e) => {
                tracing::warn!("Forecast unavailable: {}", e);
                to_money(Decimal::ZERO)
            }
        }
    }
}

pub fn confidence(history_points: usize) -> &'static str {
    if history_points > HIGH_CONFIDENCE_POINTS {
        "high"
    } else {
        "medium"
    }
}

fn future_total(points: &[ForecastPoint], last_day: NaiveDate) -> Decimal {
    let total: f64 = points
        .iter()
        .filter(|p| p.ds > last_day && p.yhat.is_finite())
        .map(|p| p.yhat)
        .sum();
    let total = Decimal::from_f64(total.max(0.0)).unwrap_or(Decimal::ZERO);
    to_money(total)
}
