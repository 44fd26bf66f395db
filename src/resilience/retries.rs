//! Retry logic.
//!
//! # Responsibilities
//! - Hold the immutable retry policy (attempt bound + backoff)
//! - Execute an upstream-calling operation with sequential retries
//! - Surface the failure of the final attempt on exhaustion
//!
//! # Design Decisions
//! - Policy is a plain value handed to the executor, never attached to a handler
//! - Attempt N+1 starts only after attempt N failed and its backoff elapsed
//! - Callers may classify failures; unclassified execution retries everything
//! - Dropping the returned future abandons any remaining attempts

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

/// Bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` counts the first attempt and is at least 1.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn single_attempt() -> Self {
        Self::new(1, Backoff::Immediate)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Delay after the failed attempt with 0-based index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Backoff::default())
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// Every failure is retried. On exhaustion the error of the last attempt is
/// returned unchanged.
pub async fn execute_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    execute_with_retry_when(policy, operation, op, |_| true).await
}

/// Like [`execute_with_retry`], but stops at the first failure for which
/// `should_retry` returns false.
pub async fn execute_with_retry_when<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        tracing::warn!(
            operation = %operation,
            attempt = attempt + 1,
            max_attempts,
            error = %error,
            "Attempt failed"
        );

        if !should_retry(&error) {
            tracing::debug!(operation = %operation, "Failure is not retryable");
            return Err(error);
        }

        if attempt + 1 >= max_attempts {
            tracing::error!(
                operation = %operation,
                attempts = max_attempts,
                error = %error,
                "Retries exhausted"
            );
            return Err(error);
        }

        let delay = policy.delay(attempt);
        tracing::debug!(
            operation = %operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Backing off before retry"
        );
        metrics::record_retry(operation);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
