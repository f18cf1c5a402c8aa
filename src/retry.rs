use crate::error::BackendError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Linear-backoff retry over retryable [`BackendError`]s.
///
/// Attempt `n` that fails with a retryable error is followed by a sleep of
/// `backoff * n`, including the last attempt, after which the error is
/// returned. Fatal errors are returned at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_secs: f64) -> Self {
        let backoff = if backoff_secs.is_finite() && backoff_secs > 0.0 {
            Duration::from_secs_f64(backoff_secs)
        } else {
            Duration::ZERO
        };
        Self {
            max_attempts: max_retries.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, BackendError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "{} failed: {}; sleeping {:?}",
                        label,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
