//! Bounded exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use tracing::{debug, error, warn};
use triage_types::BatchConfig;

use crate::error::OrganizerError;

/// How many times, and how patiently, transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&BatchConfig> for RetryPolicy {
    fn from(config: &BatchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            current_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// retry budget is spent. The last error is returned.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, OrganizerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OrganizerError>>,
    {
        let mut backoff = self.backoff();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            debug!(operation = what, attempt = attempts, "Attempting");

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempts > self.max_retries {
                        error!(operation = what, error = %e, attempts, "Max retries exceeded");
                        return Err(e);
                    }
                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                operation = what,
                                error = %e,
                                retry_in_ms = duration.as_millis() as u64,
                                "Transient failure, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(operation = what, error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}
