use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::types::ConsoleError;

/// Backoff for one-shot backend calls (dashboard, history, health).
///
/// Streams are never retried: a failed stream hands over to the fallback
/// producer instead.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Delay before retry `attempt` (0-indexed): doubling from `base_delay`
    /// plus up to one `base_delay` of jitter. A rate-limited backend (429)
    /// gets a flat second per attempt.
    pub fn delay_for(&self, error: &ConsoleError, attempt: u32) -> Duration {
        let delay = match error {
            ConsoleError::HttpStatus { status: 429, .. } => Duration::from_secs(1 + attempt as u64),
            _ => {
                let backoff = self.base_delay.saturating_mul(1 << attempt.min(16));
                backoff + self.base_delay.mul_f64(rand::random::<f64>())
            }
        };
        delay.min(self.max_delay)
    }
}

/// Run `factory` until it succeeds, fails with a non-retryable error, or
/// `max_retries` extra attempts are spent.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut factory: F,
) -> Result<T, ConsoleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConsoleError>>,
{
    let mut attempt = 0;
    loop {
        let error = match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let class = error.classify();
        if !class.retryable {
            debug!(operation = operation_name, error_type = class.error_type, "Not retrying");
            return Err(error);
        }
        if attempt >= config.max_retries {
            warn!(operation = operation_name, attempts = attempt + 1, error = %error, "Giving up");
            return Err(error);
        }

        let delay = config.delay_for(&error, attempt);
        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            error_type = class.error_type,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Backend call failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limited() -> ConsoleError {
        ConsoleError::HttpStatus { url: "u".into(), status: 429, body: String::new() }
    }

    #[test]
    fn test_rate_limited_delay_is_linear_and_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(&rate_limited(), 0), Duration::from_secs(1));
        assert_eq!(config.delay_for(&rate_limited(), 1), Duration::from_secs(2));
        assert_eq!(config.delay_for(&rate_limited(), 9), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_doubles_with_jitter() {
        let config = RetryConfig::default();
        let timeout = ConsoleError::Timeout { url: "u".into(), after_ms: 10 };
        let d0 = config.delay_for(&timeout, 0).as_secs_f64();
        let d2 = config.delay_for(&timeout, 2).as_secs_f64();
        assert!((0.25..=0.5).contains(&d0));
        assert!((1.0..=1.25).contains(&d2));
        assert_eq!(config.delay_for(&timeout, 40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_first_try() {
        let result = with_retry("test", &RetryConfig::default(), || async {
            Ok::<_, ConsoleError>(42)
        }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_fails_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry("test", &RetryConfig { max_retries: 3, ..Default::default() }, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ConsoleError::Configuration("unset".into()))
            }
        }).await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_recovers_after_transient_failure() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry("test", &RetryConfig { max_retries: 2, ..Default::default() }, || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(ConsoleError::Connectivity { url: "u".into(), message: "reset".into() })
                } else {
                    Ok(n)
                }
            }
        }).await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_stops_after_max_retries() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry("test", &RetryConfig { max_retries: 2, ..Default::default() }, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ConsoleError::HttpStatus { url: "u".into(), status: 503, body: String::new() })
            }
        }).await;

        assert!(matches!(result, Err(ConsoleError::HttpStatus { status: 503, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_disabled_makes_single_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry("test", &RetryConfig::none(), || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ConsoleError::Timeout { url: "u".into(), after_ms: 10 })
            }
        }).await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
