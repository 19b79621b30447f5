//! Upstream market data source trait

use std::collections::HashMap;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::{DataType, Quote};
use crate::domain::DomainError;

/// Upstream provider of quotes for a single data type (scraper, finance API, ...)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Data type this source serves
    fn data_type(&self) -> DataType;

    /// Fetches several symbols in one call.
    ///
    /// A symbol mapped to `None`, or missing from the map, was not
    /// returned by the upstream.
    async fn fetch_batch(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Option<Quote>>, DomainError>;

    /// Fetches a single symbol
    async fn fetch_one(&self, symbol: &str) -> Result<Quote, DomainError>;
}
