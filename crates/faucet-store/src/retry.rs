//! Bounded retry with exponential backoff for remote ledger calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Default number of attempts per remote call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff duration (doubles with each attempt).
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

/// Maximum backoff duration.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5000;

/// How often and how patiently to retry a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Sleep after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound for any single sleep.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Longest a single retried call can take when every attempt runs for
    /// `per_attempt` before failing.
    #[must_use]
    pub fn worst_case(&self, per_attempt: Duration) -> Duration {
        let attempts = self.max_attempts.max(1);
        let mut total = per_attempt * attempts;
        let mut backoff = self.initial_backoff;
        for _ in 1..attempts {
            total += backoff;
            backoff = (backoff * 2).min(self.max_backoff);
        }
        total
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Only errors for which [`StoreError::is_transient`] holds are retried.
    /// Exhaustion is reported as [`StoreError::Unavailable`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;

                    if attempt >= max_attempts {
                        tracing::warn!(
                            operation = %operation,
                            attempt = %attempt,
                            error = %e,
                            "Ledger call failed after max retries"
                        );
                        return Err(StoreError::Unavailable {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }

                    tracing::debug!(
                        operation = %operation,
                        attempt = %attempt,
                        backoff_ms = %backoff.as_millis(),
                        error = %e,
                        "Ledger call failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}
