//! Aggregator configuration

use std::time::Duration;

use crate::domain::market::DataType;
use crate::domain::retry::{RetryPolicy, RetrySettings};
use crate::domain::ttl::VolatilityMultipliers;

/// Cache lifetime before volatility scaling, per data type
pub fn default_base_ttl(data_type: DataType) -> Duration {
    match data_type {
        DataType::UsStock | DataType::JpStock => Duration::from_secs(300),
        DataType::MutualFund => Duration::from_secs(3600),
        DataType::ExchangeRate => Duration::from_secs(600),
    }
}

/// Settings for one [`DataAggregator`](super::DataAggregator)
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub base_ttl: Duration,
    pub use_differential: bool,
    pub multipliers: VolatilityMultipliers,
    /// Policy wrapped around every upstream call
    pub fetch_retry: RetryPolicy,
}

impl AggregatorConfig {
    pub fn for_data_type(data_type: DataType) -> Self {
        Self {
            base_ttl: default_base_ttl(data_type),
            use_differential: true,
            multipliers: VolatilityMultipliers::default(),
            fetch_retry: RetrySettings::default().to_policy(),
        }
    }

    pub fn with_base_ttl(mut self, ttl: Duration) -> Self {
        self.base_ttl = ttl;
        self
    }

    pub fn with_differential(mut self, enabled: bool) -> Self {
        self.use_differential = enabled;
        self
    }

    pub fn with_multipliers(mut self, multipliers: VolatilityMultipliers) -> Self {
        self.multipliers = multipliers;
        self
    }

    pub fn with_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch_retry = policy;
        self
    }
}
