//! In-memory fallback repository

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::fallback::{fallback_key, FallbackRecord, FallbackRepository};
use crate::domain::market::DataType;
use crate::domain::DomainError;

/// In-memory implementation of FallbackRepository
#[derive(Debug)]
pub struct InMemoryFallbackRepository {
    records: RwLock<HashMap<String, FallbackRecord>>,
}

impl InMemoryFallbackRepository {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryFallbackRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FallbackRepository for InMemoryFallbackRepository {
    async fn get(
        &self,
        symbol: &str,
        data_type: DataType,
    ) -> Result<Option<FallbackRecord>, DomainError> {
        let records = self
            .records
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        Ok(records.get(&fallback_key(symbol, data_type)).cloned())
    }

    async fn put(&self, record: FallbackRecord) -> Result<(), DomainError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        records.insert(fallback_key(&record.symbol, record.data_type), record);
        Ok(())
    }
}
