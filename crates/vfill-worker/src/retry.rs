//! Retry with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Configure from a total attempt cap (minimum 1).
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        self.with_max_retries(max_attempts.max(1) - 1)
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (0-based).
    fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success { value: T, attempts: u32 },
    /// The last error, either non-retryable or after all attempts were spent.
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. } | RetryResult::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// `max_retries + 1` attempts have been made.
pub async fn retry_async<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    operation: F,
) -> RetryResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                return RetryResult::Success {
                    value,
                    attempts: attempt + 1,
                }
            }
            Err(e) if attempt < config.max_retries && should_retry(&e) => {
                let delay = config.delay_for_retry(attempt);
                attempt += 1;
                debug!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt + 1,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(100));
        assert_eq!(config.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_retry(3), Duration::from_millis(800));
        assert_eq!(config.delay_for_retry(30), Duration::from_secs(10));
    }

    #[test]
    fn test_max_attempts_floor() {
        assert_eq!(RetryConfig::new("t").with_max_attempts(0).max_attempts(), 1);
        assert_eq!(RetryConfig::new("t").with_max_attempts(3).max_retries, 2);
    }

    #[tokio::test]
    async fn test_eventual_success_counts_attempts() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = retry_async(&config, |_: &&str| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(result.attempts(), 3);
    }

    #[tokio::test]
    async fn test_stops_at_attempt_cap() {
        let config = RetryConfig::new("test")
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = retry_async(&config, |_: &&str| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("always") }
        })
        .await;

        assert!(!result.is_success());
        assert_eq!(result.attempts(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = retry_async(&config, |e: &&str| *e != "fatal", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("fatal") }
        })
        .await;

        assert_eq!(result.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
