//! Fallback domain - serving stale data when live retrieval fails

mod entity;
mod repository;
mod store;

pub use entity::FallbackRecord;
pub use repository::{FallbackRepository, fallback_key};
pub use store::FallbackStore;

#[cfg(test)]
pub use repository::MockFallbackRepository;
