//! Bounded exponential backoff around retryable operations.
//!
//! Infrastructure errors carry a [`RetryPolicy`]; this module turns that
//! policy into an actual retry loop: delay doubles per attempt from a
//! configured base up to a cap, a server-requested minimum delay is honored
//! when larger, and the attempt ceiling is absolute. `NonRetryable` stops
//! immediately.

use std::future::Future;
use std::time::Duration;

use pipeline::RetryPolicy;

/// Retry schedule shared by the fetch and write boundaries.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// The backoff delay after the given zero-based failed attempt.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, its error becomes non-retryable, or
/// the attempt ceiling is reached. Returns the last error on exhaustion.
///
/// `label` names the operation in retry logs.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    label: &str,
    policy_of: impl Fn(&E) -> RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let next_attempt = attempt + 1;
                let after = match policy_of(&error) {
                    RetryPolicy::NonRetryable => {
                        tracing::warn!(%error, label, "operation failed, not retryable");
                        return Err(error);
                    }
                    RetryPolicy::Retryable { after } => after,
                };
                if next_attempt >= config.max_attempts {
                    tracing::warn!(
                        %error,
                        label,
                        attempts = next_attempt,
                        "retry ceiling reached"
                    );
                    return Err(error);
                }

                let mut delay = config.delay_for(attempt);
                if let Some(min) = after {
                    delay = delay.max(min).min(config.max_delay);
                }
                tracing::debug!(
                    %error,
                    label,
                    attempt = next_attempt,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt = next_attempt;
            }
        }
    }
}
