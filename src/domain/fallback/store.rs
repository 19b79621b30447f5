//! Fallback store - last known-good values for failed fetches

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{FallbackRecord, FallbackRepository};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::market::DataType;

/// Best-effort bookkeeping of failures and known-good payloads.
///
/// No method fails: repository errors are logged and swallowed so this
/// never blocks the request path. Counter updates are read-modify-write
/// without locking; concurrent failures may undercount.
#[derive(Clone)]
pub struct FallbackStore {
    repository: Arc<dyn FallbackRepository>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for FallbackStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackStore")
            .field("repository", &"<FallbackRepository>")
            .field("clock", &self.clock)
            .finish()
    }
}

impl FallbackStore {
    pub fn new(repository: Arc<dyn FallbackRepository>) -> Self {
        Self {
            repository,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bumps the failure counter for a symbol and remembers the error
    pub async fn record_failed_fetch(&self, symbol: &str, data_type: DataType, error_message: &str) {
        let now = self.clock.now();
        let mut record = self
            .load(symbol, data_type)
            .await
            .unwrap_or_else(|| FallbackRecord::new(symbol, data_type, now));

        record.record_failure(error_message, now);
        let failure_count = record.failure_count;

        match self.repository.put(record).await {
            Ok(()) => debug!(
                symbol = %symbol,
                data_type = %data_type,
                failure_count,
                "Recorded failed fetch"
            ),
            Err(e) => warn!(
                symbol = %symbol,
                data_type = %data_type,
                error = %e,
                "Failed to record failed fetch"
            ),
        }
    }

    /// Stores `payload` as the latest known-good value
    pub async fn record_success(&self, symbol: &str, data_type: DataType, payload: Value) {
        let now = self.clock.now();
        let mut record = self
            .load(symbol, data_type)
            .await
            .unwrap_or_else(|| FallbackRecord::new(symbol, data_type, now));

        record.record_success(payload, now);

        if let Err(e) = self.repository.put(record).await {
            warn!(
                symbol = %symbol,
                data_type = %data_type,
                error = %e,
                "Failed to store fallback value"
            );
        }
    }

    /// Latest known-good payload, if any.
    ///
    /// Callers tag what they serve from here as fallback data.
    pub async fn get_fallback_for_symbol(&self, symbol: &str, data_type: DataType) -> Option<Value> {
        self.load(symbol, data_type).await.and_then(|record| record.data)
    }

    async fn load(&self, symbol: &str, data_type: DataType) -> Option<FallbackRecord> {
        match self.repository.get(symbol, data_type).await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    data_type = %data_type,
                    error = %e,
                    "Failed to read fallback record"
                );
                None
            }
        }
    }
}
