//! Upstream source infrastructure

mod http;

pub use http::{HttpMarketDataSource, SourceConfig};
