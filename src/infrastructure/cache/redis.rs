//! Redis cache backend

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ErrorKind, RedisError};
use tracing::warn;

use crate::domain::cache::{CacheBackend, CacheRecord};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::DomainError;

/// Configuration for the Redis backend
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Keys requested per SCAN round trip
    pub scan_count: usize,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            scan_count: 100,
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// Cache table in Redis.
///
/// Records are stored as JSON strings. Redis expiry is set to the
/// record's own lifetime, so Redis reclaims entries the store never
/// cleans up.
#[derive(Clone)]
pub struct RedisCacheBackend {
    connection: ConnectionManager,
    config: RedisCacheConfig,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheBackend")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCacheBackend {
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::configuration(format!("Invalid Redis URL: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("connect", e))?;

        Ok(Self {
            connection,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn prefix_key(&self, key: &str) -> String {
        prefixed(self.config.key_prefix.as_deref(), key)
    }

    /// Seconds until the record expires, at least one
    fn expiry_secs(&self, record: &CacheRecord) -> u64 {
        (record.ttl - self.clock.epoch_secs()).max(1) as u64
    }

    async fn scan_keys(&self) -> Result<Vec<String>, DomainError> {
        let pattern = self.prefix_key("*");
        let mut conn = self.connection.clone();
        let mut cursor = 0u64;
        let mut keys = Vec::new();

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.config.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| map_redis_error("scan", e))?;

            keys.extend(batch);
            cursor = next_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

fn prefixed(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, key),
        None => key.to_string(),
    }
}

/// Maps Redis failures onto the retry classification.
///
/// Connection problems are network errors and a loading or clustered
/// server asking us to retry is throttling; both are retried. Anything
/// else is a cache error.
fn map_redis_error(operation: &str, error: RedisError) -> DomainError {
    let message = format!("Redis {} failed: {}", operation, error);

    if error.is_timeout()
        || error.is_io_error()
        || error.is_connection_refusal()
        || error.is_connection_dropped()
    {
        return DomainError::network(message);
    }

    match error.kind() {
        ErrorKind::TryAgain | ErrorKind::BusyLoadingError => DomainError::throttled(message),
        _ => DomainError::cache(message),
    }
}

fn decode(key: &str, raw: &str) -> Result<CacheRecord, DomainError> {
    serde_json::from_str(raw)
        .map_err(|e| DomainError::cache(format!("Corrupt cache record '{}': {}", key, e)))
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, DomainError> {
        let mut conn = self.connection.clone();

        let raw: Option<String> = conn
            .get(self.prefix_key(key))
            .await
            .map_err(|e| map_redis_error("get", e))?;

        raw.map(|raw| decode(key, &raw)).transpose()
    }

    async fn put(&self, record: CacheRecord) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();
        let value = serde_json::to_string(&record)
            .map_err(|e| DomainError::internal(format!("Failed to encode cache record: {}", e)))?;

        let _: () = conn
            .set_ex(self.prefix_key(&record.key), value, self.expiry_secs(&record))
            .await
            .map_err(|e| map_redis_error("set", e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        let deleted: i32 = conn
            .del(self.prefix_key(key))
            .await
            .map_err(|e| map_redis_error("delete", e))?;

        Ok(deleted > 0)
    }

    async fn scan(&self) -> Result<Vec<CacheRecord>, DomainError> {
        let keys = self.scan_keys().await?;
        let mut conn = self.connection.clone();
        let mut records = Vec::with_capacity(keys.len());

        for key in keys {
            // Keys can expire between SCAN and GET
            let raw: Option<String> = conn.get(&key).await.map_err(|e| map_redis_error("get", e))?;

            if let Some(raw) = raw {
                match decode(&key, &raw) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(key = %key, error = %e, "Skipping unreadable cache record"),
                }
            }
        }

        Ok(records)
    }
}
