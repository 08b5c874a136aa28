//! Retry utilities with exponential backoff for resilient API calls.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; an operation runs at most `max_retries + 1` times
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Uniform jitter applied to each delay, as a fraction of it (0.1 = ±10%)
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

impl RetryConfig {
    /// Set maximum retries
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter fraction, clamped to `[0, 1]`; non-finite values disable jitter
    pub fn jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = clamp_jitter(fraction);
        self
    }

    /// Un-jittered delay before retry `attempt` (0-indexed):
    /// `min(max_delay, base_delay * backoff_multiplier^attempt)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp_delay = self.base_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = exp_delay.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else if capped > 0.0 {
            self.max_delay
        } else {
            Duration::ZERO
        }
    }

    /// Perturb `delay` uniformly by ±`jitter_fraction`
    fn apply_jitter(&self, delay: Duration) -> Duration {
        let fraction = clamp_jitter(self.jitter_fraction);
        if fraction == 0.0 || delay.is_zero() {
            return delay;
        }
        let range = delay.as_secs_f64() * fraction;
        let offset = rand::thread_rng().gen_range(-range..=range);
        Duration::try_from_secs_f64((delay.as_secs_f64() + offset).max(0.0)).unwrap_or(delay)
    }

    /// Delay to wait after `error` failed attempt `attempt`.
    ///
    /// A provider-supplied retry-after, capped at `max_delay`, replaces the
    /// computed delay only when it is longer.
    pub fn delay_for(&self, attempt: u32, error: &SourceError) -> Duration {
        let computed = self.apply_jitter(self.backoff_delay(attempt));
        match error.retry_after() {
            Some(retry_after) => computed.max(retry_after.min(self.max_delay)),
            None => computed,
        }
    }
}

fn clamp_jitter(fraction: f64) -> f64 {
    if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Runs operations under a [`RetryConfig`].
///
/// Retryable failures (see [`SourceError::is_retryable`]) are retried with
/// backoff; anything else is returned immediately without a second attempt.
#[derive(Debug, Clone)]
pub struct RetryHandler {
    name: String,
    config: RetryConfig,
}

impl RetryHandler {
    /// Create a handler labelled `name` for log output
    pub fn new(name: impl Into<String>, config: RetryConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an async operation with retry logic
    ///
    /// Runs `operation` up to `max_retries + 1` times. On exhaustion the last
    /// error is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        tracing::info!(
                            "[{}] Operation succeeded on attempt {} after {} transient failures",
                            self.name,
                            attempt + 1,
                            attempt
                        );
                    }
                    return Ok(result);
                }
                Err(error) if !error.is_retryable() => {
                    return Err(error);
                }
                Err(error) => {
                    if attempt >= self.config.max_retries {
                        tracing::warn!(
                            "[{}] All {} retries exhausted: {}",
                            self.name,
                            self.config.max_retries,
                            error
                        );
                        return Err(error);
                    }

                    let delay = self.config.delay_for(attempt, &error);
                    tracing::info!(
                        "[{}] Retry {}/{} after {}, waiting {:.2}s",
                        self.name,
                        attempt + 1,
                        self.config.max_retries,
                        error,
                        delay.as_secs_f64()
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_first_try() {
        let handler = RetryHandler::new("test", RetryConfig::default());
        let calls = Arc::new(AtomicU32::new(0));

        let result = handler
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, SourceError>("success")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_failures() {
        let handler = RetryHandler::new("test", fast_config());
        let calls = Arc::new(AtomicU32::new(0));

        let result = handler
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    let count = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if count < 3 {
                        Err(SourceError::Network("temporary error".to_string()))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let handler = RetryHandler::new("test", fast_config());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), SourceError> = handler
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::http(404, "not found"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), SourceError::http(404, "not found"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let handler = RetryHandler::new("test", fast_config());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), SourceError> = handler
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::http(503, format!("attempt {}", n)))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.unwrap_err(), SourceError::http(503, "attempt 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_runs_once() {
        let handler = RetryHandler::new("test", fast_config().max_retries(0));
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), SourceError> = handler
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::Timeout("read".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.0,
        };
        let handler = RetryHandler::new("test", config);
        let start = Instant::now();

        let _: Result<(), SourceError> = handler
            .execute(|| async { Err(SourceError::Connection("reset".into())) })
            .await;

        // 1s before the second attempt, 2s before the third
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.0,
        };

        let delays: Vec<u64> = (0..5).map(|k| config.backoff_delay(k).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        assert_eq!(config.backoff_delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let config = RetryConfig::default();
        let error = SourceError::Timeout("t".into());

        for _ in 0..500 {
            let delay = config.delay_for(1, &error).as_secs_f64();
            assert!((1.79..=2.21).contains(&delay), "{delay}");
        }
    }

    #[test]
    fn test_retry_after_extends_but_never_shortens() {
        let config = fast_config()
            .base_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(60));
        let with_hint = |secs: u64| SourceError::Http {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(secs)),
        };

        assert_eq!(config.delay_for(0, &with_hint(10)), Duration::from_secs(10));
        assert_eq!(config.delay_for(0, &with_hint(600)), Duration::from_secs(60));
        assert_eq!(config.delay_for(0, &with_hint(0)), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_builder_clamps_fraction() {
        assert_eq!(RetryConfig::default().jitter(f64::NAN).jitter_fraction, 0.0);
        assert_eq!(RetryConfig::default().jitter(f64::INFINITY).jitter_fraction, 0.0);
        assert_eq!(RetryConfig::default().jitter(-0.5).jitter_fraction, 0.0);
        assert_eq!(RetryConfig::default().jitter(3.0).jitter_fraction, 1.0);

        let handler = RetryHandler::new("test", fast_config().jitter(0.25));
        assert_eq!(handler.config().jitter_fraction, 0.25);
    }

    #[test]
    fn test_non_finite_jitter_field_is_ignored() {
        let error = SourceError::Timeout("t".into());
        for fraction in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let config = RetryConfig {
                jitter_fraction: fraction,
                ..RetryConfig::default()
            };
            assert_eq!(config.delay_for(0, &error), Duration::from_secs(1));
        }
    }
}
