//! Cache key layout

use std::fmt::Display;

/// Namespace of base snapshots
pub const BASE_SNAPSHOT_NAMESPACE: &str = "meta";

/// Namespace of fallback records sharing a backend with the cache
pub const FALLBACK_NAMESPACE: &str = "fallback";

/// Key of a cached quote: `{dataType}:{symbol}`
pub fn entry_key(data_type: impl Display, symbol: &str) -> String {
    format!("{}:{}", data_type, symbol)
}

/// Key of the base snapshot for a logical series: `meta:{baseDataKey}`
pub fn base_snapshot_key(base_data_key: &str) -> String {
    format!("{}:{}", BASE_SNAPSHOT_NAMESPACE, base_data_key)
}

/// Whether `key` addresses a base snapshot
pub fn is_base_snapshot_key(key: &str) -> bool {
    key.strip_prefix(BASE_SNAPSHOT_NAMESPACE)
        .is_some_and(|rest| rest.starts_with(':'))
}

/// Whether `key` addresses a fallback record rather than a cache entry
pub fn is_fallback_key(key: &str) -> bool {
    key.strip_prefix(FALLBACK_NAMESPACE)
        .is_some_and(|rest| rest.starts_with(':'))
}
