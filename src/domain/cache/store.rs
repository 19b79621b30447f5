//! Cache store - TTL cache with optional differential storage

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::diff::{compute_diff, merge};
use super::entry::{CacheRecord, CacheStats, CachedValue, SetOptions, Volatility, payload_size};
use super::key::{base_snapshot_key, is_fallback_key};
use super::repository::CacheBackend;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::retry::{RetryPolicy, RetrySettings, with_retry};
use crate::domain::DomainError;

/// Extra lifetime of a base snapshot over the entry that created it
pub const BASE_SNAPSHOT_EXTRA_TTL: Duration = Duration::from_secs(86_400);

/// TTL cache over a [`CacheBackend`]
///
/// Expiry is lazy: an expired record is removed when it is read.
/// `cleanup` exists to bound storage, not for correctness. Writes are
/// blind overwrites, so concurrent writers race with last-writer-wins.
#[derive(Debug, Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            retry: RetrySettings::new(2, 50, 1_000).to_policy(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Policy applied to every backend call
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reads a valid entry, or `None` on a miss.
    ///
    /// Diff entries are merged over their base snapshot; a diff whose
    /// base is gone or expired is a miss.
    pub async fn get(&self, key: &str) -> Result<Option<CachedValue>, DomainError> {
        let now = self.clock.epoch_secs();

        let Some(record) = self.get_valid(key, now).await? else {
            debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        if !record.is_differential {
            return Ok(Some(Self::cached_value(record, None, now)));
        }

        let Some(base_data_key) = record.base_data_key.clone() else {
            warn!(key = %key, "Differential entry without base key, treating as miss");
            return Ok(None);
        };

        let base_key = base_snapshot_key(&base_data_key);

        match self.get_valid(&base_key, now).await? {
            Some(base) => Ok(Some(Self::cached_value(record, Some(&base.data), now))),
            None => {
                debug!(key = %key, base_key = %base_key, "Base snapshot missing for diff entry");
                Ok(None)
            }
        }
    }

    /// Writes `data` under `key`, valid for `ttl`.
    ///
    /// With `options.use_differential` only the fields that differ from
    /// the series' base snapshot are stored. Any failure on that path
    /// falls back to a full write.
    pub async fn set(
        &self,
        key: &str,
        data: Value,
        ttl: Duration,
        options: SetOptions,
    ) -> Result<(), DomainError> {
        let now = self.clock.now();
        let expires_at = now.timestamp() + ttl.as_secs() as i64;

        if options.use_differential {
            match options.base_data_key.as_deref() {
                Some(base_data_key) => {
                    match self
                        .set_differential(key, &data, expires_at, base_data_key, options.volatility, now)
                        .await
                    {
                        Ok(true) => return Ok(()),
                        Ok(false) => {
                            debug!(key = %key, "Diff not worth storing, writing full entry");
                        }
                        Err(e) => {
                            warn!(key = %key, error = %e, "Differential write failed, writing full entry");
                        }
                    }
                }
                None => {
                    warn!(key = %key, "Differential write requested without base key");
                }
            }
        }

        self.write(CacheRecord::full(key, data, expires_at, options.volatility, now))
            .await
    }

    /// Deletes `key`; removing a missing key is not an error
    pub async fn remove(&self, key: &str) -> Result<(), DomainError> {
        with_retry(&self.retry, || self.backend.delete(key)).await?;
        Ok(())
    }

    /// Deletes every expired record and returns how many were removed.
    ///
    /// Fallback records stored in the same backend are left alone.
    pub async fn cleanup(&self) -> Result<usize, DomainError> {
        let now = self.clock.epoch_secs();
        let records = self.scan_entries().await?;
        let mut removed = 0;

        for record in records.iter().filter(|r| !r.is_valid_at(now)) {
            match with_retry(&self.retry, || self.backend.delete(&record.key)).await {
                Ok(true) => removed += 1,
                Ok(false) => debug!(key = %record.key, "Expired entry already gone"),
                Err(e) => warn!(key = %record.key, error = %e, "Failed to remove expired entry"),
            }
        }

        debug!(scanned = records.len(), removed, "Cache cleanup finished");
        Ok(removed)
    }

    /// Entry counts, sizes and differential savings
    pub async fn get_stats(&self) -> Result<CacheStats, DomainError> {
        let records = self.scan_entries().await?;
        Ok(CacheStats::from_records(&records, self.clock.epoch_secs()))
    }

    /// Cache entries and base snapshots, without fallback records
    async fn scan_entries(&self) -> Result<Vec<CacheRecord>, DomainError> {
        let mut records = with_retry(&self.retry, || self.backend.scan()).await?;
        records.retain(|record| !is_fallback_key(&record.key));
        Ok(records)
    }

    /// Returns whether a diff entry was written; `false` means a full
    /// entry should be written instead
    async fn set_differential(
        &self,
        key: &str,
        data: &Value,
        expires_at: i64,
        base_data_key: &str,
        volatility: Volatility,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let base_key = base_snapshot_key(base_data_key);

        let Some(base) = self.get_valid(&base_key, now.timestamp()).await? else {
            // Re-creation overwrites, so two racing writers are harmless
            let base_expires_at = expires_at + BASE_SNAPSHOT_EXTRA_TTL.as_secs() as i64;
            self.write(CacheRecord::full(&base_key, data.clone(), base_expires_at, volatility, now))
                .await?;
            self.write(CacheRecord::full(key, data.clone(), expires_at, volatility, now))
                .await?;

            debug!(key = %key, base_key = %base_key, "Created base snapshot");
            return Ok(true);
        };

        let diff = Value::Object(compute_diff(&base.data, data)?);
        let original_size = payload_size(data);

        if payload_size(&diff) >= original_size {
            return Ok(false);
        }

        self.write(CacheRecord::differential(
            key,
            diff,
            base_data_key,
            original_size,
            expires_at,
            volatility,
            now,
        ))
        .await?;

        Ok(true)
    }

    /// Reads a record, removing and hiding it when expired
    async fn get_valid(&self, key: &str, now: i64) -> Result<Option<CacheRecord>, DomainError> {
        let record = with_retry(&self.retry, || self.backend.get(key)).await?;

        match record {
            Some(record) if record.is_valid_at(now) => Ok(Some(record)),
            Some(_) => {
                if let Err(e) = self.remove(key).await {
                    warn!(key = %key, error = %e, "Failed to remove expired entry");
                }
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn write(&self, record: CacheRecord) -> Result<(), DomainError> {
        with_retry(&self.retry, || self.backend.put(record.clone())).await
    }

    fn cached_value(record: CacheRecord, base: Option<&Value>, now: i64) -> CachedValue {
        let ttl_remaining = record.remaining_ttl(now);
        let data = match base {
            Some(base) => merge(base, &record.data),
            None => record.data,
        };

        CachedValue {
            key: record.key,
            data,
            expires_at: record.ttl,
            ttl_remaining,
            volatility: record.volatility,
            is_differential: record.is_differential,
        }
    }
}
