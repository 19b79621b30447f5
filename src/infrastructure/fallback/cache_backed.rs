//! Fallback repository stored in the cache table

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::cache::{CacheBackend, CacheRecord, Volatility};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::fallback::{fallback_key, FallbackRecord, FallbackRepository};
use crate::domain::market::DataType;
use crate::domain::DomainError;

/// Days a fallback record survives without being touched
pub const DEFAULT_RETENTION_DAYS: u64 = 30;

/// Keeps fallback records next to cache entries, under
/// `fallback:{data_type}:{symbol}`.
///
/// Each write pushes the record's expiry out by the retention period,
/// so symbols nobody asks for age out on their own.
#[derive(Debug)]
pub struct CacheBackedFallbackRepository {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl CacheBackedFallbackRepository {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            retention: Duration::from_secs(DEFAULT_RETENTION_DAYS * 86_400),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

#[async_trait]
impl FallbackRepository for CacheBackedFallbackRepository {
    async fn get(
        &self,
        symbol: &str,
        data_type: DataType,
    ) -> Result<Option<FallbackRecord>, DomainError> {
        let key = fallback_key(symbol, data_type);

        let Some(stored) = self.backend.get(&key).await? else {
            return Ok(None);
        };

        if !stored.is_valid_at(self.clock.epoch_secs()) {
            return Ok(None);
        }

        let record = serde_json::from_value(stored.data).map_err(|e| {
            DomainError::storage(format!("Corrupt fallback record '{}': {}", key, e))
        })?;

        Ok(Some(record))
    }

    async fn put(&self, record: FallbackRecord) -> Result<(), DomainError> {
        let key = fallback_key(&record.symbol, record.data_type);
        let now = self.clock.now();
        let expires_at = now.timestamp() + self.retention.as_secs() as i64;

        let data: Value = serde_json::to_value(&record).map_err(|e| {
            DomainError::internal(format!("Failed to encode fallback record: {}", e))
        })?;

        self.backend
            .put(CacheRecord::full(key, data, expires_at, Volatility::Low, now))
            .await
    }
}
