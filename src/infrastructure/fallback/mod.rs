//! Fallback infrastructure - fallback record repositories

mod cache_backed;
mod in_memory;

pub use cache_backed::{CacheBackedFallbackRepository, DEFAULT_RETENTION_DAYS};
pub use in_memory::InMemoryFallbackRepository;
