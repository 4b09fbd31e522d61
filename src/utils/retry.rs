//! Retry utilities for resilient operations
//!
//! Retry behaviour is described by a [`RetryPolicy`] value (bounded attempts,
//! fixed delay, and which failures qualify) and applied with [`retry`].
//! The harvester uses two policies: [`RetryPolicy::fetch`] for network
//! fetches and [`RetryPolicy::store`] for store writes.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::HarvesterErrorTrait;

/// Which failures a policy retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOn {
    /// Every failure is retried until attempts run out
    AnyError,
    /// Only failures reporting `is_recoverable()` are retried
    Recoverable,
}

/// Fixed-delay, bounded-attempts retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Wait between two attempts
    pub delay: Duration,

    /// Failures that qualify for another attempt
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    /// Policy for feed fetches: 3 attempts, 60 seconds apart, any failure
    pub const fn fetch() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(60),
            retry_on: RetryOn::AnyError,
        }
    }

    /// Policy for store writes: 3 attempts, 2 seconds apart, transient failures only
    pub const fn store() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            retry_on: RetryOn::Recoverable,
        }
    }

    /// Same qualifying rule, different attempt count and delay
    #[must_use]
    pub fn with_attempts(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.delay = delay;
        self
    }

    fn qualifies<E: HarvesterErrorTrait>(&self, error: &E) -> bool {
        match self.retry_on {
            RetryOn::AnyError => true,
            RetryOn::Recoverable => error.is_recoverable(),
        }
    }
}

/// Run `operation` under `policy`
///
/// Returns the first success. A failure that does not qualify under the
/// policy is returned immediately; otherwise the last failure is returned
/// once `max_attempts` attempts have been made.
///
/// # Example
///
/// ```no_run
/// use catalog_harvester::utils::retry::{retry, RetryPolicy};
/// use catalog_harvester::error::FetchError;
///
/// # async fn example() -> Result<(), FetchError> {
/// let body = retry(&RetryPolicy::fetch(), || async {
///     Ok::<_, FetchError>("<feed/>".to_string())
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: HarvesterErrorTrait + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !policy.qualifies(&e) => {
                debug!(error = %e, "Non-retryable error encountered");
                return Err(e);
            }
            Err(e) if attempt >= max_attempts => {
                warn!(attempt, max_attempts, error = %e, "Retry attempts exhausted");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "Operation failed, will retry"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
