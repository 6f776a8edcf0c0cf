//! Data extraction from the external market-data provider.
//!
//! Each extractor trait exposes one method per signal. The `StockSignal` and
//! `FxSignal` enums map onto those methods, so callers select an operation by
//! variant rather than by name.

pub mod circuit_breaker;
pub mod derived;
pub mod table;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use table::{Dividend, PriceBar, Table};
pub use yahoo::YahooExtractor;

use crate::identifier::{FxPair, Ticker};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from extraction and columnar output.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider is refusing requests (circuit breaker open)")]
    CircuitOpen,

    #[error("no data returned for {identifier}")]
    NoData { identifier: String },

    #[error("unexpected provider response: {0}")]
    Response(String),

    #[error("columnar I/O error: {0}")]
    Columnar(String),

    #[error("unknown signal '{0}'")]
    UnknownSignal(String),
}

/// Inclusive request window in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// `[January 1 of now's year, now]`.
    pub fn year_to_date(now: DateTime<Utc>) -> Self {
        let start = Utc
            .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        Self { start, end: now }
    }
}

/// Per-ticker artifacts produced by the stock pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSignal {
    Prices,
    Dividends,
    CompanyProfile,
    Fundamentals,
}

impl StockSignal {
    pub const ALL: [StockSignal; 4] = [
        StockSignal::Prices,
        StockSignal::Dividends,
        StockSignal::CompanyProfile,
        StockSignal::Fundamentals,
    ];

    /// Sub-fetches run per ticker unless a run selects others.
    pub const DEFAULT: [StockSignal; 3] = [
        StockSignal::Prices,
        StockSignal::Dividends,
        StockSignal::CompanyProfile,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            StockSignal::Prices => "stock_price.parquet",
            StockSignal::Dividends => "dividends.parquet",
            StockSignal::CompanyProfile => "company_profile.parquet",
            StockSignal::Fundamentals => "fundamentals.parquet",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockSignal::Prices => "prices",
            StockSignal::Dividends => "dividends",
            StockSignal::CompanyProfile => "company_profile",
            StockSignal::Fundamentals => "fundamentals",
        }
    }

    /// Dispatch to the extractor method backing this signal.
    pub fn extract(
        self,
        extractor: &dyn StockExtractor,
        ticker: &Ticker,
    ) -> Result<Table, ExtractError> {
        match self {
            StockSignal::Prices => extractor.stock_prices(ticker),
            StockSignal::Dividends => extractor.dividends(ticker),
            StockSignal::CompanyProfile => extractor.company_profile(ticker),
            StockSignal::Fundamentals => extractor.fundamentals(ticker),
        }
    }
}

impl fmt::Display for StockSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockSignal {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StockSignal::ALL
            .into_iter()
            .find(|signal| signal.as_str() == s)
            .ok_or_else(|| ExtractError::UnknownSignal(s.to_string()))
    }
}

/// Per-pair artifacts produced by the FX pipeline. One run fetches one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FxSignal {
    Prices,
    Profile,
    Fundamentals,
    Calculations,
    Forecast,
}

impl FxSignal {
    pub const ALL: [FxSignal; 5] = [
        FxSignal::Prices,
        FxSignal::Profile,
        FxSignal::Fundamentals,
        FxSignal::Calculations,
        FxSignal::Forecast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FxSignal::Prices => "prices",
            FxSignal::Profile => "profile",
            FxSignal::Fundamentals => "fundamentals",
            FxSignal::Calculations => "calculations",
            FxSignal::Forecast => "forecast",
        }
    }

    /// Directory name for this signal's artifacts, e.g. `fx_prices`.
    pub fn dir_name(&self) -> String {
        format!("fx_{}", self.as_str())
    }

    /// Error log name for this signal's runs, e.g. `error_fx_prices.log`.
    pub fn error_log_name(&self) -> String {
        format!("error_fx_{}.log", self.as_str())
    }

    /// Dispatch to the extractor method backing this signal.
    pub fn extract(
        self,
        extractor: &dyn FxExtractor,
        pair: &FxPair,
        range: Option<DateRange>,
    ) -> Result<Table, ExtractError> {
        match self {
            FxSignal::Prices => extractor.fx_prices(pair, range),
            FxSignal::Profile => extractor.fx_profile(pair),
            FxSignal::Fundamentals => extractor.fx_fundamentals(pair),
            FxSignal::Calculations => extractor.fx_calculations(pair, range),
            FxSignal::Forecast => extractor.fx_forecast(pair, range),
        }
    }
}

impl fmt::Display for FxSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FxSignal {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FxSignal::ALL
            .into_iter()
            .find(|signal| signal.as_str() == s)
            .ok_or_else(|| ExtractError::UnknownSignal(s.to_string()))
    }
}

/// Stock data source. Implementations must be callable from many threads.
pub trait StockExtractor: Send + Sync {
    fn stock_prices(&self, ticker: &Ticker) -> Result<Table, ExtractError>;
    fn dividends(&self, ticker: &Ticker) -> Result<Table, ExtractError>;
    fn company_profile(&self, ticker: &Ticker) -> Result<Table, ExtractError>;
    fn fundamentals(&self, ticker: &Ticker) -> Result<Table, ExtractError>;

    /// Time until the provider accepts requests again (open circuit breaker).
    fn cooldown(&self) -> Duration {
        Duration::ZERO
    }
}

/// FX data source. `None` ranges request the full available history.
pub trait FxExtractor: Send + Sync {
    fn fx_prices(&self, pair: &FxPair, range: Option<DateRange>) -> Result<Table, ExtractError>;
    fn fx_profile(&self, pair: &FxPair) -> Result<Table, ExtractError>;
    fn fx_fundamentals(&self, pair: &FxPair) -> Result<Table, ExtractError>;
    fn fx_calculations(&self, pair: &FxPair, range: Option<DateRange>)
        -> Result<Table, ExtractError>;
    fn fx_forecast(&self, pair: &FxPair, range: Option<DateRange>) -> Result<Table, ExtractError>;

    /// Time until the provider accepts requests again (open circuit breaker).
    fn cooldown(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_to_date_starts_on_january_first() {
        let now = Utc.with_ymd_and_hms(2025, 7, 14, 9, 30, 0).unwrap();
        let range = DateRange::year_to_date(now);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end, now);
    }

    #[test]
    fn signals_parse_from_their_names() {
        for signal in FxSignal::ALL {
            assert_eq!(signal.as_str().parse::<FxSignal>().unwrap(), signal);
        }
        for signal in StockSignal::ALL {
            assert_eq!(signal.as_str().parse::<StockSignal>().unwrap(), signal);
        }
        assert!("extract_fx_magic".parse::<FxSignal>().is_err());
    }

    #[test]
    fn fx_signal_names_artifacts() {
        assert_eq!(FxSignal::Prices.dir_name(), "fx_prices");
        assert_eq!(FxSignal::Forecast.error_log_name(), "error_fx_forecast.log");
        assert_eq!(StockSignal::CompanyProfile.file_name(), "company_profile.parquet");
    }
}
