//! Cache backend trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use super::entry::CacheRecord;
use crate::domain::DomainError;

/// Key/value table the cache lives in
///
/// Implementations store records verbatim. Expiry is decided by the
/// caller from `CacheRecord::ttl`; a backend may additionally evict
/// expired rows on its own.
#[async_trait]
pub trait CacheBackend: Send + Sync + Debug {
    /// Fetches a record by key
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, DomainError>;

    /// Writes a record, overwriting any existing one with the same key
    async fn put(&self, record: CacheRecord) -> Result<(), DomainError>;

    /// Deletes a record; returns whether one existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Returns every stored record
    async fn scan(&self) -> Result<Vec<CacheRecord>, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Which operation an injected error applies to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum MockOp {
        Get,
        Put,
        Delete,
        Scan,
    }

    /// Mock cache backend for testing
    #[derive(Debug, Default)]
    pub struct MockCacheBackend {
        records: Mutex<HashMap<String, CacheRecord>>,
        errors: Mutex<HashMap<MockOp, (DomainError, usize)>>,
        vanished: Mutex<Vec<CacheRecord>>,
        puts: AtomicUsize,
    }

    impl MockCacheBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_record(self, record: CacheRecord) -> Self {
            self.records
                .lock()
                .unwrap()
                .insert(record.key.clone(), record);
            self
        }

        /// Reports `record` from scan although it is already gone, as
        /// when native expiry runs between SCAN and DEL
        pub fn with_vanished_record(self, record: CacheRecord) -> Self {
            self.vanished.lock().unwrap().push(record);
            self
        }

        /// Fails every call of `op`
        pub fn with_error(self, op: MockOp, error: DomainError) -> Self {
            self.errors.lock().unwrap().insert(op, (error, usize::MAX));
            self
        }

        /// Fails the next `times` calls of `op`
        pub fn with_error_times(self, op: MockOp, error: DomainError, times: usize) -> Self {
            self.errors.lock().unwrap().insert(op, (error, times));
            self
        }

        pub fn record(&self, key: &str) -> Option<CacheRecord> {
            self.records.lock().unwrap().get(key).cloned()
        }

        pub fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        pub fn put_count(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }

        fn check_error(&self, op: MockOp) -> Result<(), DomainError> {
            let mut errors = self.errors.lock().unwrap();

            if let Some((error, remaining)) = errors.get_mut(&op) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(error.clone());
                }
            }

            Ok(())
        }
    }

    #[async_trait]
    impl CacheBackend for MockCacheBackend {
        async fn get(&self, key: &str) -> Result<Option<CacheRecord>, DomainError> {
            self.check_error(MockOp::Get)?;
            Ok(self.records.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, record: CacheRecord) -> Result<(), DomainError> {
            self.check_error(MockOp::Put)?;
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.records
                .lock()
                .unwrap()
                .insert(record.key.clone(), record);
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            self.check_error(MockOp::Delete)?;
            Ok(self.records.lock().unwrap().remove(key).is_some())
        }

        async fn scan(&self) -> Result<Vec<CacheRecord>, DomainError> {
            self.check_error(MockOp::Scan)?;
            let mut records: Vec<CacheRecord> =
                self.records.lock().unwrap().values().cloned().collect();
            records.extend(self.vanished.lock().unwrap().iter().cloned());
            Ok(records)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::cache::Volatility;
        use chrono::Utc;
        use serde_json::json;

        fn record(key: &str) -> CacheRecord {
            CacheRecord::full(key, json!({"v": 1}), i64::MAX, Volatility::Medium, Utc::now())
        }

        #[tokio::test]
        async fn test_mock_backend_put_get_delete() {
            let backend = MockCacheBackend::new();
            backend.put(record("a")).await.unwrap();

            assert!(backend.get("a").await.unwrap().is_some());
            assert!(backend.delete("a").await.unwrap());
            assert!(!backend.delete("a").await.unwrap());
            assert!(backend.get("a").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_mock_backend_error_times() {
            let backend = MockCacheBackend::new().with_error_times(
                MockOp::Get,
                DomainError::throttled("busy"),
                1,
            );

            assert!(backend.get("a").await.is_err());
            assert!(backend.get("a").await.is_ok());
        }
    }
}
