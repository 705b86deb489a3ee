//! Retry with bounded exponential backoff for remote calls.

use std::time::Duration;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// Backoff policy for transient remote failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Cap applied to every computed delay.
    pub max_delay: Duration,
    /// Add up to 25% random jitter to each delay, to avoid synchronized
    /// retries against a shared rate limit.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with no jitter, for deterministic scheduling.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Backoff delay after the given failed attempt (1-indexed):
    /// `min(base * 2^(attempt - 1), max_delay)`, before jitter.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let raw = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exp));
        raw.min(self.max_delay)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        if self.jitter {
            let factor = 1.0 + pseudo_random() * 0.25;
            Duration::from_millis((base.as_millis() as f64 * factor) as u64)
        } else {
            base
        }
    }
}

/// Executes remote operations, retrying transient failures.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor with the given policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The configured policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run an operation, retrying transient failures up to
    /// `max_attempts` total attempts.
    ///
    /// Authentication and validation failures propagate immediately; after
    /// exhaustion the last transient error is surfaced unchanged.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = SyncResult<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_transient() || attempt >= self.policy.max_attempts {
                        return Err(err);
                    }
                    let delay = self.policy.jittered_delay(attempt);
                    debug!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient remote error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Cheap non-cryptographic randomness for jitter.
fn pseudo_random() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    (hasher.finish() as f64) / (u64::MAX as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn delay_follows_backoff_formula() {
        let policy = RetryPolicy::default().without_jitter();
        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
        assert_eq!(policy.delay(3), Duration::from_millis(4000));
        assert_eq!(policy.delay(4), Duration::from_millis(8000));
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = RetryPolicy::default().without_jitter();
        // 1000 * 2^4 = 16000, capped at 10000.
        assert_eq!(policy.delay(5), Duration::from_millis(10_000));
        assert_eq!(policy.delay(20), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn succeeds_first_try_without_retry() {
        let executor = RetryExecutor::default();
        let calls = AtomicUsize::new(0);

        let result = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, SyncError>(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_attempted_exactly_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        };
        let executor = RetryExecutor::new(policy);
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        let result: SyncResult<()> = executor
            .execute(move || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Err(SyncError::transient("remote 503")) }
            })
            .await;

        assert!(matches!(result, Err(SyncError::Transient { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        };
        let executor = RetryExecutor::new(policy);
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        let result = executor
            .execute(move || {
                let n = counted.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SyncError::rate_limited("throttled"))
                    } else {
                        Ok(99)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_failure_never_retried() {
        let executor = RetryExecutor::default();
        let calls = AtomicUsize::new(0);

        let result: SyncResult<()> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SyncError::auth("401")) }
            })
            .await;

        assert!(matches!(result, Err(SyncError::Auth { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_failure_never_retried() {
        let executor = RetryExecutor::default();
        let calls = AtomicUsize::new(0);

        let result: SyncResult<()> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SyncError::validation("missing CustomerRef")) }
            })
            .await;

        assert!(matches!(result, Err(SyncError::Validation { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
