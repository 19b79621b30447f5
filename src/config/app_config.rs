use std::time::Duration;

use serde::Deserialize;

use crate::domain::market::DataType;
use crate::domain::retry::RetrySettings;
use crate::domain::ttl::VolatilityMultipliers;
use crate::infrastructure::cache::{CacheConfig, CacheType};
use crate::infrastructure::fallback::DEFAULT_RETENTION_DAYS;
use crate::infrastructure::source::SourceConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub fallback: FallbackConfig,
    pub retry: RetryConfig,
    pub ttl: TtlConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub backend: CacheType,
    pub key_prefix: Option<String>,
    pub retention_days: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Upstream calls
    pub fetch: RetrySettings,
    /// Cache backend calls
    pub store: RetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub us_stock_secs: u64,
    pub jp_stock_secs: u64,
    pub mutual_fund_secs: u64,
    pub exchange_rate_secs: u64,
    pub use_differential: bool,
    pub multipliers: VolatilityMultipliers,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            backend: CacheType::InMemory,
            key_prefix: None,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl FallbackConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 86_400)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            fetch: RetrySettings::default(),
            store: RetrySettings::new(2, 50, 1_000),
        }
    }
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            us_stock_secs: 300,
            jp_stock_secs: 300,
            mutual_fund_secs: 3_600,
            exchange_rate_secs: 600,
            use_differential: true,
            multipliers: VolatilityMultipliers::default(),
        }
    }
}

impl TtlConfig {
    /// Base TTL for `data_type`, before volatility scaling
    pub fn base_ttl(&self, data_type: DataType) -> Duration {
        let secs = match data_type {
            DataType::UsStock => self.us_stock_secs,
            DataType::JpStock => self.jp_stock_secs,
            DataType::MutualFund => self.mutual_fund_secs,
            DataType::ExchangeRate => self.exchange_rate_secs,
        };

        Duration::from_secs(secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
