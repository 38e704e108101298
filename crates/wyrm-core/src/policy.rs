//! Timeout and bounded retry for calls into external models.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, WyrmError};

/// Deadline and retry budget for one guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Deadline for a single attempt.
    pub timeout: Duration,

    /// Additional attempts after the first one fails.
    pub max_retries: u32,

    /// Pause before each retry.
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl CallPolicy {
    /// Create a policy from whole seconds.
    pub fn new(timeout_secs: u64, max_retries: u32) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            ..Default::default()
        }
    }

    /// Run `op` under the deadline, retrying retryable failures.
    ///
    /// Non-retryable errors are returned immediately.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.backoff).await;
            }

            let outcome = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(WyrmError::Timeout {
                    operation: operation.to_string(),
                    secs: self.timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(
                        "{} failed (attempt {}/{}), retrying: {}",
                        operation, attempt, attempts, e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| WyrmError::internal(format!("{} made no attempts", operation))))
    }
}
