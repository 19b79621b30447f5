//! Domain layer - Core business logic and entities

pub mod aggregator;
pub mod cache;
pub mod clock;
pub mod error;
pub mod fallback;
pub mod market;
pub mod retry;
pub mod ttl;

pub use aggregator::{AggregatorConfig, DataAggregator, MarketDataService};
pub use cache::{CacheBackend, CacheStats, CacheStore, SetOptions, Volatility};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DomainError;
pub use fallback::{FallbackRecord, FallbackRepository, FallbackStore};
pub use market::{DataSource, DataType, MarketDataSource, Quote, QuoteDetails};
pub use retry::{with_retry, RetryPolicy, RetrySettings};
pub use ttl::{TtlPolicy, VolatilityMultipliers};
