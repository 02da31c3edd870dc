//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Retry budget and backoff base for a single remote read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (3 => 4 attempts in total)
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff_factor * 2^n`
    pub backoff_factor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_secs(1),
        }
    }
}

/// Outcome of an exhausted retry loop.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay to wait after failed attempt `attempt` (counted from 0).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_factor
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `operation` until it succeeds or the retry budget is spent.
    ///
    /// Intermediate failures are logged only; the caller sees the final
    /// error together with the number of attempts made.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, Exhausted<E>>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let total = self.total_attempts();
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        operation = label,
                        attempt = attempt + 1,
                        total,
                        error = %e,
                        "Attempt failed"
                    );

                    if attempt >= self.max_retries {
                        error!(operation = label, "Max retries reached. Skipping this cycle.");
                        return Err(Exhausted {
                            attempts: attempt + 1,
                            last_error: e,
                        });
                    }

                    let delay = self.delay_for(attempt);
                    info!(operation = label, "Retrying in {:?}...", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
