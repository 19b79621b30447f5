//! Infrastructure layer - External service implementations

pub mod cache;
pub mod fallback;
pub mod logging;
pub mod metrics;
pub mod source;
