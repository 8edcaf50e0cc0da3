//! Bounded retry with exponential backoff for outbound provider calls.

use std::future::Future;
use std::time::Duration;

/// Attempt budget and backoff base for one class of provider call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first call too; it is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// Calls `call` until it succeeds, fails with a non-transient error, or the
/// attempt budget is spent. The delay doubles after each failed attempt,
/// starting from the policy's base delay.
pub async fn retry_transient<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    is_transient: fn(&E) -> bool,
    mut call: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "Call recovered after retry");
                }
                return Ok(value);
            }
            Err(e) if is_transient(&e) && attempt < policy.max_attempts => {
                let delay = policy
                    .base_delay
                    .saturating_mul(2_u32.saturating_pow(attempt - 1));
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
