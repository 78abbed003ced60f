//! Retry policy shared by the search, submit and fetch calls.
//!
//! A policy bundles the attempt budget, the delay between attempts and the
//! predicate deciding which errors are worth repeating. Errors the predicate
//! rejects are returned after the first attempt.

use crate::error::{PubmedError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy: attempt budget, fixed delay and retriable-error predicate.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Wait between attempts
    pub delay: Duration,
    /// Decides whether an error is worth another attempt
    pub retry_on: fn(&PubmedError) -> bool,
}

impl RetryPolicy {
    /// Term searches: 3 attempts, 2 seconds apart, on any transient error.
    pub fn search() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            retry_on: PubmedError::is_transient,
        }
    }

    /// Bulk submit/fetch: 3 attempts, 10 seconds apart, on 5xx responses only.
    pub fn server_errors() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
            retry_on: PubmedError::is_server_error,
        }
    }

    /// Same policy with a different delay between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `op` until it succeeds, the error is not retriable, or the
    /// attempt budget is spent. The last error is returned on failure.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && (self.retry_on)(&e) => {
                    let wait = self.delay;
                    warn!(
                        call = label,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        wait_secs = wait.as_secs_f64(),
                        error = %e,
                        "Retriable error, waiting before next attempt"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(call = label, attempt = attempt, error = %e, "Giving up");
                    return Err(e);
                }
            }
        }
    }
}
