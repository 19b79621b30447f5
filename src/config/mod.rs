//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, FallbackConfig, LogFormat, LoggingConfig, RetryConfig, TtlConfig,
};
