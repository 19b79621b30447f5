//! Cache domain - TTL cache with differential storage

mod diff;
mod entry;
mod key;
mod repository;
mod store;

pub use diff::{compute_diff, merge};
pub use entry::{
    CacheRecord, CacheStats, CachedValue, DifferentialStats, SetOptions, Volatility, payload_size,
};
pub use key::{
    BASE_SNAPSHOT_NAMESPACE, FALLBACK_NAMESPACE, base_snapshot_key, entry_key, is_base_snapshot_key,
    is_fallback_key,
};
pub use repository::CacheBackend;
pub use store::{BASE_SNAPSHOT_EXTRA_TTL, CacheStore};

#[cfg(test)]
pub use repository::mock::{MockCacheBackend, MockOp};
