//! Retry domain - bounded retry with exponential backoff and jitter

mod executor;
mod policy;

pub use executor::with_retry;
pub use policy::{
    JitterSource, RandomJitter, RetryHook, RetryPolicy, RetryPredicate, RetrySettings,
    SequenceJitter, MAX_JITTER,
};
