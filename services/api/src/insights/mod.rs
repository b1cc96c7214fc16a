//! Read-side analytics over a user's ledger.

pub mod dashboard;
pub mod forecast;

pub use dashboard::{investments, liquidity, Investments, Liquidity, LiquidityBreakdown};
pub use forecast::{daily_series, Forecaster, ForecastingService, HttpForecaster};
