//! Retry-with-backoff wrapper around one outbound call.
//!
//! Retries rate-limit responses and transient transport failures up to
//! the policy's attempt budget, sleeping the policy's jittered
//! exponential delay between attempts. Permanent errors and exhausted
//! budgets surface the last error unchanged; the first success returns
//! immediately. This is the only retry layer in the engine — node-level
//! failures are never retried at the graph level.

use std::future::Future;

use atelier_core::backoff::RetryPolicy;

/// How an error should be treated by the retry wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// The remote asked us to slow down (HTTP 429 and friends).
    RateLimited,
    /// A transport-level hiccup likely to pass (timeout, connect, 5xx).
    Transient,
    /// Retrying will not help.
    Permanent,
}

/// Implemented by error types the wrapper knows how to classify.
pub trait Classify {
    fn retry_class(&self) -> RetryClass;
}

/// Invoke `op` until it succeeds, fails permanently, or the attempt
/// budget is spent.
pub async fn retry_with_backoff<T, E, Fut, Op>(policy: &RetryPolicy, mut op: Op) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + std::fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let class = e.retry_class();
                if class == RetryClass::Permanent || attempt >= policy.max_attempts {
                    return Err(e);
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Outbound call failed, backing off before retry",
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
