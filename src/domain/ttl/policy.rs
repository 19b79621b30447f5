//! Volatility-driven TTL policy

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::cache::Volatility;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::market::DataType;

/// `|changePercent|` above this is HIGH volatility
pub const HIGH_VOLATILITY_THRESHOLD: f64 = 5.0;
/// `|changePercent|` below this is LOW volatility
pub const LOW_VOLATILITY_THRESHOLD: f64 = 1.0;

/// TTL factor applied per volatility class
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct VolatilityMultipliers {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for VolatilityMultipliers {
    fn default() -> Self {
        Self {
            high: 0.5,
            medium: 1.0,
            low: 1.5,
        }
    }
}

impl VolatilityMultipliers {
    pub fn factor(&self, volatility: Volatility) -> f64 {
        match volatility {
            Volatility::High => self.high,
            Volatility::Medium => self.medium,
            Volatility::Low => self.low,
        }
    }

    /// `ttl` scaled by the volatility factor, never below one second
    pub fn apply(&self, ttl: Duration, volatility: Volatility) -> Duration {
        let factor = self.factor(volatility).max(0.0);
        let secs = (ttl.as_secs_f64() * factor).round() as u64;

        Duration::from_secs(secs.max(1))
    }
}

/// Classifies cached data by how fast it moves
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    clock: Arc<dyn Clock>,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl TtlPolicy {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Volatility for `payload`, and the TTL to scale by it.
    ///
    /// The returned TTL is `base_ttl` unchanged; callers turn the
    /// volatility into an effective TTL with [`VolatilityMultipliers`].
    pub fn compute_dynamic_ttl(
        &self,
        symbol: &str,
        data_type: DataType,
        payload: &Value,
        base_ttl: Duration,
    ) -> (Duration, Volatility) {
        let mut volatility = payload
            .get("changePercent")
            .and_then(Value::as_f64)
            .map(classify_change)
            .unwrap_or_default();

        if !is_market_hours(data_type, self.clock.now()) {
            volatility = volatility.downgrade();
        }

        debug!(
            symbol = %symbol,
            data_type = %data_type,
            volatility = %volatility,
            "Computed cache volatility"
        );

        (base_ttl, volatility)
    }

    pub fn is_market_open(&self, data_type: DataType) -> bool {
        is_market_hours(data_type, self.clock.now())
    }
}

fn classify_change(change_percent: f64) -> Volatility {
    let magnitude = change_percent.abs();

    if magnitude > HIGH_VOLATILITY_THRESHOLD {
        Volatility::High
    } else if magnitude < LOW_VOLATILITY_THRESHOLD {
        Volatility::Low
    } else {
        Volatility::Medium
    }
}

/// Whether the market for `data_type` is trading at `now`.
///
/// Tokyo is open UTC 00:00-06:00 and New York UTC 14:00-21:00 on
/// weekdays. Daylight saving and exchange holidays are ignored. Data
/// types without a session are always open.
pub fn is_market_hours(data_type: DataType, now: DateTime<Utc>) -> bool {
    let session = match data_type {
        DataType::JpStock => 0..6,
        DataType::UsStock => 14..21,
        DataType::MutualFund | DataType::ExchangeRate => return true,
    };

    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    session.contains(&now.hour())
}
