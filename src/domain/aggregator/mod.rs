//! Aggregation domain - serving quotes through cache, upstream and fallback

mod data_aggregator;
mod config;
mod service;

pub use data_aggregator::DataAggregator;
pub use config::{default_base_ttl, AggregatorConfig};
pub use service::MarketDataService;
