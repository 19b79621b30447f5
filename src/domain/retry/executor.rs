//! Retry executor

use std::future::Future;

use super::RetryPolicy;

/// Runs `operation` up to `policy.max_retries + 1` times.
///
/// Stops on the first success, on an error the policy refuses to retry,
/// or when attempts run out. The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy<E>, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= policy.max_retries || !policy.should_retry(&error) {
                    return Err(error);
                }

                let delay = policy.delay_for_attempt(attempt);
                policy.notify_retry(&error, attempt + 1, delay);
                tokio::time::sleep(delay).await;

                attempt += 1;
            }
        }
    }
}
