//! # Deadline Retry
//!
//! Re-runs an async operation until it succeeds, fails with a non-retryable
//! error, or the deadline passes. Sleeps between attempts follow a
//! [`FibonacciBackoff`] and never overshoot the deadline.

use crate::controller::backoff::FibonacciBackoff;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Why [`retry_until_deadline`] gave up
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The operation failed with an error the predicate rejected
    #[error("{0}")]
    Failed(E),
    /// The window closed while the error was still retryable; carries the last error
    #[error("timed out: {0}")]
    TimedOut(E),
}

/// Retry `operation` while `is_retryable` accepts its error and `timeout` has
/// not elapsed
///
/// The operation always runs at least once.
///
/// # Errors
///
/// Returns [`RetryError::Failed`] for the first non-retryable error and
/// [`RetryError::TimedOut`] with the last error once the window is exhausted.
pub async fn retry_until_deadline<T, E, F, Fut, P>(
    timeout: Duration,
    mut backoff: FibonacciBackoff,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !is_retryable(&err) {
            return Err(RetryError::Failed(err));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(RetryError::TimedOut(err));
        }

        let delay = backoff.next_backoff().min(remaining);
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        debug!(attempt, delay_ms, "Retrying after retryable error");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn backoff() -> FibonacciBackoff {
        FibonacciBackoff::new(Duration::from_millis(100), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retryable_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<&str>> = retry_until_deadline(
            Duration::from_secs(10),
            backoff(),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<&str>> = retry_until_deadline(
            Duration::from_secs(10),
            backoff(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("fatal")
            },
            |e| *e != "fatal",
        )
        .await;
        assert_eq!(result, Err(RetryError::Failed("fatal")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_last_error() {
        let start = Instant::now();
        let result: Result<(), RetryError<&str>> = retry_until_deadline(
            Duration::from_secs(2),
            backoff(),
            || async { Err("still missing") },
            |_| true,
        )
        .await;
        assert_eq!(result, Err(RetryError::TimedOut("still missing")));
        // The last sleep is capped at the remaining window
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<&str>> = retry_until_deadline(
            Duration::ZERO,
            backoff(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("missing")
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Err(RetryError::TimedOut("missing")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
