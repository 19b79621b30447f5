//! Market Data Gateway
//!
//! Caching and resilience layer in front of market data sources:
//! - Retry with exponential backoff and jitter for upstream and cache calls
//! - Volatility-aware cache lifetimes with differential storage
//! - Last known-good fallback when live retrieval fails

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use domain::{
    aggregator::{AggregatorConfig, DataAggregator, MarketDataService},
    cache::CacheStore,
    fallback::{FallbackRepository, FallbackStore},
    market::{DataType, MarketDataSource},
    retry::RetryPolicy,
    DomainError,
};
use infrastructure::{
    cache::{CacheConfig, CacheFactory, CacheType},
    fallback::{CacheBackedFallbackRepository, InMemoryFallbackRepository},
    metrics::record_retry,
    source::HttpMarketDataSource,
};
use tracing::info;

/// Builds the service with an HTTP source for every data type
pub async fn create_service(config: &AppConfig) -> Result<MarketDataService, DomainError> {
    let mut sources: Vec<Arc<dyn MarketDataSource>> = Vec::with_capacity(DataType::ALL.len());

    for data_type in DataType::ALL {
        sources.push(Arc::new(HttpMarketDataSource::new(data_type, &config.source)?));
    }

    create_service_with_sources(config, sources).await
}

/// Builds the service around the given sources, one per data type
pub async fn create_service_with_sources(
    config: &AppConfig,
    sources: Vec<Arc<dyn MarketDataSource>>,
) -> Result<MarketDataService, DomainError> {
    let factory = CacheFactory::new();

    let backend = factory.create(&config.cache).await?;
    info!(backend = %config.cache.backend, "Cache backend ready");

    let cache = Arc::new(
        CacheStore::new(backend).with_retry_policy(config.retry.store.to_policy()),
    );
    let fallback = Arc::new(FallbackStore::new(
        create_fallback_repository(config, &factory).await?,
    ));

    let mut service = MarketDataService::new(cache.clone());

    for source in sources {
        let data_type = source.data_type();
        let aggregator_config = AggregatorConfig::for_data_type(data_type)
            .with_base_ttl(config.ttl.base_ttl(data_type))
            .with_differential(config.ttl.use_differential)
            .with_multipliers(config.ttl.multipliers)
            .with_fetch_retry(fetch_policy(config, data_type));

        service = service.with_aggregator(DataAggregator::new(
            source,
            cache.clone(),
            fallback.clone(),
            aggregator_config,
        ));
    }

    Ok(service)
}

fn fetch_policy(config: &AppConfig, data_type: DataType) -> RetryPolicy {
    config
        .retry
        .fetch
        .to_policy()
        .with_on_retry(move |error, attempt, delay| record_retry(data_type, error, attempt, delay))
}

async fn create_fallback_repository(
    config: &AppConfig,
    factory: &CacheFactory,
) -> Result<Arc<dyn FallbackRepository>, DomainError> {
    match config.fallback.backend {
        CacheType::InMemory => Ok(Arc::new(InMemoryFallbackRepository::new())),
        CacheType::Redis => {
            let backend_config = CacheConfig {
                backend: CacheType::Redis,
                redis_url: config.cache.redis_url.clone(),
                key_prefix: config.fallback.key_prefix.clone(),
                ..CacheConfig::default()
            };
            let backend = factory.create(&backend_config).await?;

            Ok(Arc::new(
                CacheBackedFallbackRepository::new(backend).with_retention(config.fallback.retention()),
            ))
        }
    }
}
