//! Bounded exponential backoff for rate-limited remote calls.
//!
//! Every remote read and write goes through [`RetryPolicy::execute`]. Only
//! failures for which [`crate::MigrateError::is_rate_limited`] holds are retried;
//! everything else propagates on the first attempt.

use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::error::Result;

/// Default number of attempts per remote call.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default delay before the second attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Retry policy: `max_retries` attempts in total, waiting
/// `initial_delay * 2^(attempt - 1)` after each rate-limited attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_INITIAL_DELAY)
    }
}

impl RetryPolicy {
    /// Create a policy. A zero attempt count is treated as one attempt.
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_delay,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Wait applied after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay.saturating_mul(1u32 << exponent)
    }

    /// Run `operation`, backing off while it reports rate limiting.
    ///
    /// Returns the first success, the first non-throttling error, or the last
    /// throttling error once the attempts are exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() && attempt < self.max_retries => {
                    let wait = self.delay_for(attempt);
                    info!(
                        attempt,
                        max_retries = self.max_retries,
                        "Waiting {:.1} seconds before retrying...",
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn throttled() -> MigrateError {
        MigrateError::remote(crate::error::RATE_LIMIT_STATUS, "rate limited")
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(10, Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(8000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_timing_until_success() {
        let policy = RetryPolicy::new(10, Duration::from_millis(1000));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let recorded = calls.clone();
        let value = policy
            .execute(|| {
                let recorded = recorded.clone();
                async move {
                    let mut calls = recorded.lock().unwrap();
                    calls.push(start.elapsed());
                    if calls.len() < 4 {
                        Err(throttled())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        let waits: Vec<u128> = calls
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        assert_eq!(waits, vec![1000, 2000, 4000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rate_limit_error_not_retried() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);

        let result: Result<()> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(MigrateError::remote(500, "internal")) }
            })
            .await;

        assert!(matches!(result, Err(MigrateError::Remote { status: 500, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_returns_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let attempts = AtomicU32::new(0);

        let result: Result<()> = policy
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Err(MigrateError::remote(429, format!("attempt {}", n)))
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        match result {
            Err(MigrateError::RateLimited { body, .. }) => assert_eq!(body, "attempt 3"),
            other => panic!("expected rate limited error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_immediate_success_single_call() {
        let attempts = AtomicU32::new(0);
        let value = RetryPolicy::default().execute(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, MigrateError>(7) }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
