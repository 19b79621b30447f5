//! Fallback repository trait

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::FallbackRecord;
use crate::domain::cache::FALLBACK_NAMESPACE;
use crate::domain::market::DataType;
use crate::domain::DomainError;

/// Persistence for fallback records, keyed by `(symbol, data_type)`
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FallbackRepository: Send + Sync {
    /// Finds the record for a symbol
    async fn get(
        &self,
        symbol: &str,
        data_type: DataType,
    ) -> Result<Option<FallbackRecord>, DomainError>;

    /// Creates or replaces a record
    async fn put(&self, record: FallbackRecord) -> Result<(), DomainError>;
}

/// Storage key of a fallback record
pub fn fallback_key(symbol: &str, data_type: DataType) -> String {
    format!("{}:{}:{}", FALLBACK_NAMESPACE, data_type, symbol)
}
