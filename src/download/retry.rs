//! Retry loop with pure exponential backoff.
//!
//! A request is retried when the transport fails or the server answers
//! 429 Too Many Requests. After the `n`-th failure the loop sleeps
//! `base_delay * 2^n` (2s, 4s, 8s, ... with the default 1s base), with no
//! jitter and no cap, until the retry ceiling is reached.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cpi_docs_core::download::RetryPolicy;
//!
//! let policy = RetryPolicy::with_max_attempts(4);
//! assert_eq!(policy.delay_for(1), Duration::from_secs(2));
//! assert_eq!(policy.delay_for(2), Duration::from_secs(4));
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::DownloadError;

/// Default maximum attempts per request.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Default backoff base (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Result of a single attempt, as seen by [`retry_with_backoff`].
#[derive(Debug)]
pub enum Attempt<T> {
    /// The attempt produced a final value; stop retrying.
    Done(T),
    /// The attempt hit a retryable condition.
    Retry(DownloadError),
}

/// Retry ceiling and backoff base.
///
/// # Default Values
///
/// - `max_attempts`: 8
/// - `base_delay`: 1 second
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Unit of the exponential schedule.
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings. `max_attempts` is at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Creates a policy with a custom ceiling and the default 1s base.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, DEFAULT_BASE_DELAY)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff base.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay to wait after the `failures`-th failed attempt: `base * 2^failures`.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Runs `operation` until it returns [`Attempt::Done`] or the policy's
/// ceiling is reached.
///
/// `sleep` is awaited between attempts; production code passes
/// [`tokio::time::sleep`]. Both the attempt and the sleep race against
/// `cancel`.
///
/// # Errors
///
/// - [`DownloadError::Cancelled`] if `cancel` fires first.
/// - [`DownloadError::RetryExhausted`] wrapping the last failure once every
///   attempt failed.
pub async fn retry_with_backoff<T, Op, OpFut, Sleep, SleepFut>(
    policy: &RetryPolicy,
    url: &str,
    cancel: &CancellationToken,
    mut operation: Op,
    mut sleep: Sleep,
) -> Result<T, DownloadError>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Attempt<T>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let mut failures = 0u32;

    loop {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
            outcome = operation() => outcome,
        };

        let failure = match outcome {
            Attempt::Done(value) => return Ok(value),
            Attempt::Retry(failure) => failure,
        };

        failures += 1;
        if failures >= policy.max_attempts {
            error!(url = %url, attempts = failures, error = %failure, "could not complete request");
            return Err(DownloadError::RetryExhausted {
                url: url.to_string(),
                attempts: failures,
                last: Box::new(failure),
            });
        }

        let delay = policy.delay_for(failures);
        debug!(
            url = %url,
            attempt = failures,
            delay_ms = delay.as_millis(),
            error = %failure,
            "request failed, waiting for retry"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
            () = sleep(delay) => {}
        }
    }
}
