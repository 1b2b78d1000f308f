//! Retry with exponential backoff for page loads and extractor runs.
//!
//! Transient failures (navigation errors, script exceptions, unexpected
//! extractor output) are retried. Configuration and I/O problems are
//! returned immediately; retrying would not change the outcome.

use std::time::Duration;

use futures::future::LocalBoxFuture;

use crate::error::CrawlError;

/// Returns `true` if `err` is worth another attempt.
///
/// Retriable:
/// - [`CrawlError::Navigation`]: load failed or timed out.
/// - [`CrawlError::Script`]: the extractor threw (often a half-rendered page).
/// - [`CrawlError::UnexpectedShape`] / [`CrawlError::Deserialize`]: empty or
///   partial DOM produced output of the wrong shape.
/// - [`CrawlError::ReadyTimeout`]: only reached when a caller treats the ready
///   wait as mandatory.
///
/// Everything else is permanent for the duration of a run.
pub(crate) fn is_retriable(err: &CrawlError) -> bool {
    matches!(
        err,
        CrawlError::Navigation { .. }
            | CrawlError::Script { .. }
            | CrawlError::UnexpectedShape { .. }
            | CrawlError::Deserialize { .. }
            | CrawlError::ReadyTimeout { .. }
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// The wait before retry `n` (1-based) is `backoff_base_ms * 2^(n-1)`.
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
        }
    }

    #[must_use]
    pub fn from_config(config: &grocer_core::AppConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff_base_ms)
    }

    fn delay_before_retry(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.backoff_base_ms
                .saturating_mul(1u64 << attempt.min(62)),
        )
    }

    /// Runs `operation` against `target` until it succeeds, fails with a
    /// permanent error, or the retry budget is spent. The last error is
    /// returned in the failure case.
    ///
    /// Each attempt gets a fresh reborrow of `target`, so the operation can
    /// drive an exclusively-owned navigator.
    ///
    /// # Errors
    ///
    /// Returns the final attempt's error.
    pub async fn run<S, T, F>(
        &self,
        target: &mut S,
        what: &str,
        mut operation: F,
    ) -> Result<T, CrawlError>
    where
        S: ?Sized,
        F: for<'s> FnMut(&'s mut S) -> LocalBoxFuture<'s, Result<T, CrawlError>>,
    {
        let mut attempt = 0u32;

        loop {
            let err = match operation(&mut *target).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retriable(&err) || attempt >= self.max_retries {
                return Err(err);
            }

            let delay = self.delay_before_retry(attempt);
            tracing::warn!(
                what,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "attempt failed, retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav_error() -> CrawlError {
        CrawlError::Navigation {
            url: "https://example.com/browse/dairy".to_owned(),
            reason: "net::ERR_TIMED_OUT".to_owned(),
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let mut calls = 0u32;
        let result = RetryPolicy::new(3, 0)
            .run(&mut calls, "test", |calls| {
                Box::pin(async move {
                    *calls += 1;
                    Ok::<u32, CrawlError>(42)
                })
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retries_navigation_failure_then_succeeds() {
        let mut calls = 0u32;
        let result = RetryPolicy::new(3, 0)
            .run(&mut calls, "test", |calls| {
                Box::pin(async move {
                    *calls += 1;
                    if *calls < 3 {
                        Err(nav_error())
                    } else {
                        Ok(99)
                    }
                })
            })
            .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhausting_retries() {
        let mut calls = 0u32;
        let result = RetryPolicy::new(2, 0)
            .run(&mut calls, "test", |calls| {
                Box::pin(async move {
                    *calls += 1;
                    Err::<u32, CrawlError>(nav_error())
                })
            })
            .await;
        // max_retries=2 → 3 total attempts
        assert_eq!(calls, 3);
        assert!(matches!(result, Err(CrawlError::Navigation { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_io_error() {
        let mut calls = 0u32;
        let result = RetryPolicy::new(3, 0)
            .run(&mut calls, "test", |calls| {
                Box::pin(async move {
                    *calls += 1;
                    Err::<u32, CrawlError>(CrawlError::io(
                        "/datasets/Coles/dairy.json",
                        std::io::Error::other("disk full"),
                    ))
                })
            })
            .await;
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(CrawlError::Io { .. })));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, 100);
        assert_eq!(policy.delay_before_retry(0), Duration::from_millis(100));
        assert_eq!(policy.delay_before_retry(1), Duration::from_millis(200));
        assert_eq!(policy.delay_before_retry(3), Duration::from_millis(800));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(100, u64::MAX);
        assert_eq!(
            policy.delay_before_retry(90),
            Duration::from_millis(u64::MAX)
        );
    }
}
