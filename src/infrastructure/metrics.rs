//! Prometheus metrics

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::debug;

use crate::domain::market::DataType;
use crate::domain::DomainError;

/// Handle onto the installed Prometheus recorder
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Metrics in the Prometheus text exposition format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global Prometheus recorder.
///
/// Without a recorder the counters recorded throughout the crate are no-ops.
pub fn init_metrics() -> Option<PrometheusMetrics> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_default_metrics();
            tracing::debug!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("market_data_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    describe_counter!("market_data_cache_hits_total", "Symbols served from cache");
    describe_counter!("market_data_cache_misses_total", "Symbols not found in cache");
    describe_counter!(
        "market_data_fetch_failures_total",
        "Symbols the upstream could not provide after retries"
    );
    describe_counter!(
        "market_data_fallback_served_total",
        "Symbols answered with last known-good data"
    );
    describe_counter!("market_data_retries_total", "Retried upstream calls");
}

/// Retry hook for upstream calls of `data_type`
pub fn record_retry(data_type: DataType, error: &DomainError, attempt: u32, delay: Duration) {
    counter!("market_data_retries_total", "data_type" => data_type.as_str()).increment(1);

    debug!(
        data_type = %data_type,
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %error,
        "Retrying upstream call"
    );
}
