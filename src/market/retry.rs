//! Bounded retry with linear backoff.
//!
//! Any failed attempt (transport error, timeout, malformed payload) is retried
//! up to `max_retries` total attempts. Exhaustion yields `None`, never an error.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_delay * n` before the next try.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }

    /// Run `operation` until it succeeds or attempts are exhausted.
    pub async fn run<F, Fut, T, E>(&self, label: &str, mut operation: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_retries.max(1);

        for attempt in 1..=attempts {
            match operation().await {
                Ok(value) => return Some(value),
                Err(e) if attempt < attempts => {
                    let backoff = self.backoff(attempt);
                    warn!(
                        label,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying after failed request"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!(label, attempts, error = %e, "Giving up after exhausting retries");
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(6));
    }

    #[test]
    fn test_from_config_never_zero_attempts() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_retries: 0,
            retry_delay_ms: 10,
        });
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.retry_delay, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("stub", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(format!("failure {n}"))
                    } else {
                        Ok("payload")
                    }
                }
            })
            .await;

        assert_eq!(result, Some("payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_failing_returns_none_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Option<()> = fast_policy()
            .run("stub", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_success_makes_one_call() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("stub", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, String>(7) }
            })
            .await;

        assert_eq!(result, Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
