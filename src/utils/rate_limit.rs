//! Per-provider request pacing.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::config::ConfigError;

/// Minimum-interval rate limiter for one provider client.
///
/// Grants are spaced at least `1 / requests_per_second` apart, measured from
/// the previous grant. There is no burst allowance. Concurrent callers queue
/// on the internal lock and are granted one at a time.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    requests_per_second: f64,
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for `name` allowing `requests_per_second`
    pub fn new(name: impl Into<String>, requests_per_second: f64) -> Result<Self, ConfigError> {
        let name = name.into();
        let min_interval = Self::interval_for(&name, requests_per_second)?;

        Ok(Self {
            name,
            requests_per_second,
            min_interval,
            last_grant: Mutex::new(None),
        })
    }

    /// Spacing between grants at `requests_per_second`.
    ///
    /// Fails for rates that are not positive and for rates so small the
    /// interval does not fit in a [`Duration`].
    pub fn interval_for(name: &str, requests_per_second: f64) -> Result<Duration, ConfigError> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "rate limit for '{}' must be a positive number, got {}",
                name, requests_per_second
            )));
        }

        Duration::try_from_secs_f64(1.0 / requests_per_second).map_err(|_| {
            ConfigError::Invalid(format!(
                "rate limit for '{}' is too small to schedule, got {}",
                name, requests_per_second
            ))
        })
    }

    /// Wait until a request may be issued, then record the grant
    pub async fn acquire(&self) {
        let mut last_grant = self.last_grant.lock().await;

        if let Some(last) = *last_grant {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                let wait = ready_at - now;
                if wait > Duration::from_millis(100) {
                    tracing::debug!(
                        "[{}] Rate limit: waiting {:.2}s",
                        self.name,
                        wait.as_secs_f64()
                    );
                }
                sleep_until(ready_at).await;
            }
        }

        *last_grant = Some(Instant::now());
    }

    /// Configured rate
    pub fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    /// Minimum spacing between grants
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Provider this limiter belongs to
    pub fn name(&self) -> &str {
        &self.name
    }
}
