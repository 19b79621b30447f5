//! Cache infrastructure - cache table backends

mod factory;
mod in_memory;
mod redis;

pub use factory::{CacheConfig, CacheFactory, CacheType};
pub use in_memory::{InMemoryCacheBackend, InMemoryCacheConfig};
pub use redis::{RedisCacheBackend, RedisCacheConfig};
