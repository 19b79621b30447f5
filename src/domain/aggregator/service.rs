//! Market data service - routes requests to the aggregator of each data type

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::DataAggregator;
use crate::domain::cache::{CacheStats, CacheStore};
use crate::domain::market::{DataType, Quote};
use crate::domain::DomainError;

/// Entry point used by the CLI; one aggregator per data type over a
/// shared cache
#[derive(Debug)]
pub struct MarketDataService {
    aggregators: HashMap<DataType, DataAggregator>,
    cache: Arc<CacheStore>,
}

impl MarketDataService {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self {
            aggregators: HashMap::new(),
            cache,
        }
    }

    /// Registers an aggregator, replacing any previous one for its data type
    pub fn with_aggregator(mut self, aggregator: DataAggregator) -> Self {
        self.aggregators.insert(aggregator.data_type(), aggregator);
        self
    }

    pub fn data_types(&self) -> Vec<DataType> {
        DataType::ALL
            .into_iter()
            .filter(|data_type| self.aggregators.contains_key(data_type))
            .collect()
    }

    pub async fn get_data(
        &self,
        data_type: DataType,
        symbols: &[String],
        force_refresh: bool,
    ) -> Result<HashMap<String, Quote>, DomainError> {
        let aggregator = self.aggregators.get(&data_type).ok_or_else(|| {
            DomainError::configuration(format!("No source configured for {}", data_type))
        })?;

        Ok(aggregator.get_data(symbols, force_refresh).await)
    }

    /// Purges expired cache entries, returning how many were removed
    pub async fn cleanup(&self) -> Result<usize, DomainError> {
        let removed = self.cache.cleanup().await?;
        info!(removed, "Cache cleanup finished");
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats, DomainError> {
        self.cache.get_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregator::AggregatorConfig;
    use crate::domain::cache::{CacheRecord, MockCacheBackend, Volatility};
    use crate::domain::clock::ManualClock;
    use crate::domain::fallback::FallbackStore;
    use crate::domain::market::MockMarketDataSource;
    use crate::infrastructure::fallback::InMemoryFallbackRepository;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn service(backend: MockCacheBackend) -> MarketDataService {
        let now = Utc.with_ymd_and_hms(2024, 6, 4, 15, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let cache = Arc::new(CacheStore::new(Arc::new(backend)).with_clock(clock.clone()));
        let fallback = Arc::new(
            FallbackStore::new(Arc::new(InMemoryFallbackRepository::new())).with_clock(clock.clone()),
        );

        let mut source = MockMarketDataSource::new();
        source.expect_data_type().return_const(DataType::ExchangeRate);
        source.expect_fetch_batch().returning(|symbols| {
            Ok(symbols
                .iter()
                .map(|s| (s.clone(), Some(Quote::new(s.as_str(), 151.2, "JPY"))))
                .collect())
        });

        let aggregator = DataAggregator::new(
            Arc::new(source),
            cache.clone(),
            fallback,
            AggregatorConfig::for_data_type(DataType::ExchangeRate),
        )
        .with_clock(clock);

        MarketDataService::new(cache).with_aggregator(aggregator)
    }

    fn record(key: &str, expires_at: i64) -> CacheRecord {
        let created = Utc.with_ymd_and_hms(2024, 6, 4, 14, 0, 0).unwrap();
        CacheRecord::full(key, json!({"price": 1.0}), expires_at, Volatility::Medium, created)
    }

    #[tokio::test]
    async fn test_routes_by_data_type() {
        let service = service(MockCacheBackend::new());

        let results = service
            .get_data(DataType::ExchangeRate, &["USDJPY".to_string()], false)
            .await
            .unwrap();

        assert_eq!(results["USDJPY"].price, Some(151.2));
        assert_eq!(service.data_types(), vec![DataType::ExchangeRate]);
    }

    #[tokio::test]
    async fn test_unregistered_data_type() {
        let service = service(MockCacheBackend::new());

        let result = service
            .get_data(DataType::MutualFund, &["0331418A".to_string()], false)
            .await;

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_cleanup_and_stats() {
        let now = Utc.with_ymd_and_hms(2024, 6, 4, 15, 0, 0).unwrap().timestamp();
        let backend = MockCacheBackend::new()
            .with_record(record("exchange-rate:USDJPY", now + 60))
            .with_record(record("exchange-rate:EURJPY", now - 60));
        let service = service(backend);

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 1);

        assert_eq!(service.cleanup().await.unwrap(), 1);
        assert_eq!(service.stats().await.unwrap().total_entries, 1);
    }
}
