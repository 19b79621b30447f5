//! Retry policy value object

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::domain::DomainError;

/// Source of backoff jitter, a value in `[0, 0.2)`
pub trait JitterSource: Send + Sync + fmt::Debug {
    fn next_jitter(&self) -> f64;
}

/// Upper bound (exclusive) of the jitter fraction
pub const MAX_JITTER: f64 = 0.2;

/// Jitter drawn from the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn next_jitter(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..MAX_JITTER)
    }
}

/// Replays a fixed sequence of jitter values, repeating the last one
#[derive(Debug)]
pub struct SequenceJitter {
    values: Vec<f64>,
    position: Mutex<usize>,
}

impl SequenceJitter {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            position: Mutex::new(0),
        }
    }

    /// Always returns the same jitter
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl JitterSource for SequenceJitter {
    fn next_jitter(&self) -> f64 {
        let Ok(mut position) = self.position.lock() else {
            return 0.0;
        };

        let value = self
            .values
            .get(*position)
            .or_else(|| self.values.last())
            .copied()
            .unwrap_or(0.0);
        *position += 1;

        value.clamp(0.0, MAX_JITTER)
    }
}

pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
pub type RetryHook<E> = Arc<dyn Fn(&E, u32, Duration) + Send + Sync>;

/// Bounded retry with exponential backoff and jitter
///
/// Constructed per call site; not persisted.
pub struct RetryPolicy<E = DomainError> {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    should_retry: RetryPredicate<E>,
    on_retry: Option<RetryHook<E>>,
    jitter: Arc<dyn JitterSource>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            should_retry: Arc::clone(&self.should_retry),
            on_retry: self.on_retry.clone(),
            jitter: Arc::clone(&self.jitter),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("on_retry", &self.on_retry.is_some())
            .field("jitter", &self.jitter)
            .finish()
    }
}

impl Default for RetryPolicy<DomainError> {
    fn default() -> Self {
        Self::new(3).with_predicate(DomainError::is_retryable)
    }
}

impl<E> RetryPolicy<E> {
    /// Policy that retries every error up to `max_retries` times
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(10_000),
            should_retry: Arc::new(|_| true),
            on_retry: None,
            jitter: Arc::new(RandomJitter),
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_predicate(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Hook invoked before each backoff wait with the error, the 1-based
    /// retry number and the chosen delay
    pub fn with_on_retry(mut self, hook: impl Fn(&E, u32, Duration) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn should_retry(&self, error: &E) -> bool {
        (self.should_retry)(error)
    }

    pub(crate) fn notify_retry(&self, error: &E, retry: u32, delay: Duration) {
        if let Some(hook) = &self.on_retry {
            hook(error, retry, delay);
        }
    }

    /// `min(max_delay, base_delay * 2^attempt * (1 + jitter))` for a 0-indexed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = self.jitter.next_jitter().clamp(0.0, MAX_JITTER);
        let exponential = self.base_delay.as_secs_f64() * 2f64.powi(attempt.min(63) as i32);
        let delay = exponential * (1.0 + jitter);

        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Serializable retry settings, turned into a policy at the call site
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
        }
    }
}

impl RetrySettings {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Policy using the default transient-error predicate
    pub fn to_policy(&self) -> RetryPolicy<DomainError> {
        RetryPolicy::new(self.max_retries)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_predicate(DomainError::is_retryable)
    }
}
