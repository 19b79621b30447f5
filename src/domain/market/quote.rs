//! Quote envelope and per-instrument details

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Kind of instrument a request is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    UsStock,
    JpStock,
    MutualFund,
    ExchangeRate,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::UsStock,
        DataType::JpStock,
        DataType::MutualFund,
        DataType::ExchangeRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::UsStock => "us-stock",
            DataType::JpStock => "jp-stock",
            DataType::MutualFund => "mutual-fund",
            DataType::ExchangeRate => "exchange-rate",
        }
    }

    /// Currency quoted when the source does not say
    pub fn default_currency(&self) -> &'static str {
        match self {
            DataType::UsStock => "USD",
            DataType::JpStock | DataType::MutualFund | DataType::ExchangeRate => "JPY",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "us-stock" => Ok(DataType::UsStock),
            "jp-stock" => Ok(DataType::JpStock),
            "mutual-fund" => Ok(DataType::MutualFund),
            "exchange-rate" => Ok(DataType::ExchangeRate),
            _ => Err(DomainError::validation(format!(
                "Unknown data type: {}. Valid types: us-stock, jp-stock, mutual-fund, exchange-rate",
                s
            ))),
        }
    }
}

/// Where a quote came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataSource {
    /// Fetched live (possibly served from cache since)
    #[default]
    #[serde(rename = "API")]
    Api,
    /// Last known-good value served after a failed fetch
    #[serde(rename = "Fallback Data")]
    Fallback,
    /// Nothing usable; the quote carries an `error`
    #[serde(rename = "Unavailable")]
    Unavailable,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Api => "API",
            DataSource::Fallback => "Fallback Data",
            DataSource::Unavailable => "Unavailable",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsStockQuote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JpStockQuote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Listing market, e.g. "TSE Prime"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualFundQuote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fund_code: Option<String>,
    /// Date the net asset value refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub base_currency: String,
    pub quote_currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
}

/// Instrument-specific part of a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuoteDetails {
    UsStock(UsStockQuote),
    JpStock(JpStockQuote),
    MutualFund(MutualFundQuote),
    ExchangeRate(ExchangeRate),
}

/// Common envelope for every data type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub source: DataSource,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<QuoteDetails>,
}

impl Quote {
    pub fn new(ticker: impl Into<String>, price: f64, currency: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            price: Some(price),
            change: None,
            change_percent: None,
            currency: currency.into(),
            source: DataSource::Api,
            last_updated: Utc::now(),
            error: None,
            details: None,
        }
    }

    /// Placeholder for a symbol nothing could be found for
    pub fn unavailable(
        ticker: impl Into<String>,
        data_type: DataType,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            price: None,
            change: None,
            change_percent: None,
            currency: data_type.default_currency().to_string(),
            source: DataSource::Unavailable,
            last_updated: now,
            error: Some(error.into()),
            details: None,
        }
    }

    pub fn with_change(mut self, change: f64, change_percent: f64) -> Self {
        self.change = Some(change);
        self.change_percent = Some(change_percent);
        self
    }

    pub fn with_details(mut self, details: QuoteDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_last_updated(mut self, last_updated: DateTime<Utc>) -> Self {
        self.last_updated = last_updated;
        self
    }

    /// Re-labels the quote as stale data served after a failure
    pub fn into_fallback(mut self, now: DateTime<Utc>) -> Self {
        self.source = DataSource::Fallback;
        self.last_updated = now;
        self.error = None;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
