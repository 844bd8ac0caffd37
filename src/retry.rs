//! Bounded retry for bucket operations
//!
//! Only transient timeouts (see [`SessionError::is_transient`]) are retried.
//! The delay before attempt `n + 1` is `n * base_backoff`, so the worst-case
//! total wait for one operation is `base_backoff * max_attempts * (max_attempts - 1) / 2`.

use std::future::Future;
use std::time::Duration;

use crate::error::SessionError;

/// Retry policy for bucket reads and writes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts for one logical operation (including the first)
    pub max_attempts: u32,
    /// Backoff unit; the n-th retry waits `n * base_backoff`
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(attempt)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. On exhaustion the last timeout error is
    /// returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, SessionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %e,
                        "transient bucket error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!(operation, attempts = attempt, error = %e, "retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn timeout() -> SessionError {
        SessionError::Timeout("get".to_string())
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = policy
            .run("get", || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 2 {
                    Err(timeout())
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(4, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = policy
            .run("set", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(timeout())
            })
            .await;

        assert!(matches!(result, Err(SessionError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = policy
            .run("delete", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SessionError::StoreError("bucket gone".to_string()))
            })
            .await;

        assert!(matches!(result, Err(SessionError::StoreError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_grows_per_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(50));
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let started = Instant::now();

        let result = policy
            .run("get", || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(timeout())
                } else {
                    Ok(())
                }
            })
            .await;

        tokio_test::assert_ok!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = policy
            .run("get", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(timeout())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(50));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(100));
        assert!(policy.backoff_for(3) > policy.backoff_for(2));
    }
}
