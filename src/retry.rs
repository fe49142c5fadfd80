use crate::errors::SyncError;
use std::future::Future;
use std::time::Duration;

/// Retry policy consumed by both provider gateways.
///
/// Expresses the bounded exponential backoff discipline as one reusable
/// object instead of per-call-site loops: attempt `n` (1-based) sleeps
/// `base_delay * multiplier^(n-1)` before attempt `n+1`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Backoff growth factor between attempts.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
        }
    }

    /// Delay to sleep after the given 1-based attempt fails.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Runs `call` under the policy, retrying only transient failures.
///
/// Non-transient errors (auth, validation, permanent provider rejections)
/// surface immediately; transient ones are retried until the attempt budget
/// is exhausted, at which point the last error is returned.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation,
                    attempt,
                    policy.max_attempts,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::error!(
                        "{} failed after {} attempts: {}",
                        operation,
                        policy.max_attempts,
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}
