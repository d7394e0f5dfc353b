//! Retry-with-full-jitter policy and transient/permanent error classification
//! (spec.md §4.2, §7).

use rand::Rng;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Full-jitter backoff: `delay = random(0, min(max_delay, base * 2^attempt))`.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis().saturating_mul(1u128 << attempt.min(20));
        let capped = exp.min(self.max_delay.as_millis());
        let jittered = rand::thread_rng().gen_range(0..=capped.max(1));
        Duration::from_millis(jittered as u64)
    }

    /// Runs `f`, retrying while the error is classified retryable, up to
    /// `max_attempts` total attempts. Non-retryable errors (e.g. CircuitOpen)
    /// return immediately.
    pub async fn run<F, Fut, T, E>(&self, is_retryable: impl Fn(&E) -> bool, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.backoff_for(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Classifies whether a given error should be retried; adapters implement
/// this to distinguish transient (network blip, timeout) from permanent
/// (validation, rejection) faults.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::domain::errors::AdapterError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            crate::domain::errors::AdapterError::Transient { .. }
                | crate::domain::errors::AdapterError::Disconnected
        )
    }
}
