//! Reusable retry policy for the reconciler's write path.
//!
//! Retries only transient storage failures: serverish status codes (500,
//! 503, 429) or errors with no discernible code at all. Delay grows
//! linearly with the attempt number plus a random jitter component.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::error::StorageError;

/// Whether a storage error is worth retrying.
pub fn is_transient(error: &StorageError) -> bool {
    matches!(error.code, None | Some(500) | Some(503) | Some(429))
}

/// Bounded retry with linear backoff and jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 3 means 4 attempts total.
    pub max_retries: u32,
    /// Delay before retry n is `base_delay * n` plus jitter.
    pub base_delay: Duration,
    /// Upper bound of the uniformly random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Policy with default attempt bounds but no sleeping, for tests.
    pub fn no_delay() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.base_delay * attempt + jitter
    }

    /// Runs `operation` until it succeeds, fails permanently, or exhausts
    /// the retry budget. Non-transient errors propagate immediately.
    pub async fn run<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, StorageError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt >= self.max_retries || !is_transient(&error) {
                        return Err(error);
                    }
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient storage error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
