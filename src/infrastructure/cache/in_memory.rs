//! In-memory cache backend using moka

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::{CacheBackend, CacheRecord};
use crate::domain::DomainError;

/// Configuration for the in-memory backend
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of records
    pub max_capacity: u64,
    /// Hard upper bound on how long moka keeps a record.
    ///
    /// Logical expiry is the record's own `ttl`, enforced by the store;
    /// this only bounds memory for records nobody reads or cleans up.
    pub max_entry_lifetime: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            max_entry_lifetime: Duration::from_secs(7 * 86_400),
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_max_entry_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_entry_lifetime = lifetime;
        self
    }
}

/// Process-local cache table.
///
/// Expired records stay visible until the store removes them, so lazy
/// expiry and cleanup behave the same as against Redis.
#[derive(Debug, Clone)]
pub struct InMemoryCacheBackend {
    cache: MokaCache<String, CacheRecord>,
    config: InMemoryCacheConfig,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.max_entry_lifetime)
            .build();

        Self { cache, config }
    }

    pub fn config(&self) -> &InMemoryCacheConfig {
        &self.config
    }
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, DomainError> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, record: CacheRecord) -> Result<(), DomainError> {
        self.cache.insert(record.key.clone(), record).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn scan(&self) -> Result<Vec<CacheRecord>, DomainError> {
        self.cache.run_pending_tasks().await;

        // moka's iterator is synchronous
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || cache.iter().map(|(_, record)| record).collect())
            .await
            .map_err(|e| DomainError::cache(format!("Failed to iterate cache: {}", e)))
    }
}
