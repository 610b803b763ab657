//! Bounded retry for optimistic commits.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::{DomainError, Result};

/// Configuration for retrying a commit that lost an optimistic race.
///
/// The delay before retry `n` is drawn uniformly from
/// `0..=min(base_delay_ms * 2^(n-1), max_delay_ms)` (full jitter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Base delay between retries in milliseconds (exponential backoff)
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay_ms: 5,
            max_delay_ms: 200,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Upper bound of the backoff window after `attempt` failed attempts.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        // Cap the shift to prevent overflow
        let shift = attempt.saturating_sub(1).min(63);
        let multiplier = 1u64 << shift;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Jittered delay after `attempt` failed attempts.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Runs `attempt_fn` until it succeeds, fails with something other than a
/// store conflict, or the attempt budget is spent.
///
/// `attempt_fn` receives the 1-based attempt number and must re-read
/// everything it depends on; a conflict means its snapshot is stale. An
/// exhausted budget surfaces as `DomainError::Conflict`.
pub async fn retry_on_conflict<T, F, Fut>(
    config: &RetryConfig,
    operation: &'static str,
    mut attempt_fn: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable_conflict() => {
                metrics::counter!("commit_conflicts_total", "operation" => operation).increment(1);

                if attempt >= max_attempts {
                    tracing::warn!(operation, attempts = attempt, "Retry budget exhausted");
                    return Err(DomainError::Conflict {
                        operation,
                        attempts: attempt,
                    });
                }

                let delay = config.jittered_delay(attempt);
                tracing::debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Commit conflict, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
