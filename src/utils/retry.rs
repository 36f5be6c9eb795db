//! Bounded fixed-delay retry.
//!
//! Oracle calls must never hang or abort a batch: each call gets a fixed
//! number of attempts with a fixed delay between them, and callers that can
//! degrade gracefully supply a terminal fallback value instead of an error.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// A retry policy carried as data: attempt count and inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts, three seconds apart.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `f` up to `max_attempts` times, sleeping `delay` between attempts.
    /// Returns the last error if every attempt fails.
    pub async fn run<F, Fut, T, E>(&self, operation: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(
                            operation,
                            attempts = attempt,
                            error = %e,
                            "operation failed after all retries"
                        );
                        return Err(e);
                    }
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "operation failed, retrying"
                    );
                    sleep(self.delay).await;
                }
            }
        }
    }

    /// Like [`run`](Self::run), but degrades to `fallback` on exhaustion
    /// instead of surfacing an error.
    pub async fn run_with_fallback<F, Fut, T, E>(&self, operation: &str, f: F, fallback: T) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match self.run(operation, f).await {
            Ok(value) => value,
            Err(_) => fallback,
        }
    }
}
