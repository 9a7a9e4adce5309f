//! Retry policy for remote calls.

use crate::remote::RemoteError;
use std::time::Duration;

/// Configuration for retry behavior on transient remote errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between attempts.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Add up to 25% jitter
            let jitter = delay_secs * 0.25 * rand_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Runs a remote operation, retrying transient errors with backoff.
///
/// Returns the final result together with the number of retries
/// performed. Permanent errors are returned immediately; a timeout
/// counts as a transient failure, never as success.
pub fn retry_remote<T, F>(config: &RetryConfig, mut operation: F) -> (Result<T, RemoteError>, u32)
where
    F: FnMut() -> Result<T, RemoteError>,
{
    let mut retries = 0;
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            std::thread::sleep(config.delay_for_attempt(attempt));
            retries += 1;
        }

        match operation() {
            Ok(value) => return (Ok(value), retries),
            Err(error) => {
                if error.is_transient() && attempt + 1 < config.max_attempts {
                    tracing::debug!(attempt, error = %error, "transient remote error, will retry");
                    last_error = Some(error);
                    continue;
                }
                return (Err(error), retries);
            }
        }
    }

    // Unreachable with max_attempts >= 1; kept for totality.
    (
        Err(last_error.unwrap_or_else(|| RemoteError::unavailable("no attempts made"))),
        retries,
    )
}

/// Simple deterministic "jitter" (no external RNG dependency).
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_config() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn delay_grows_exponentially() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: false,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        let delay = config.delay_for_attempt(5);
        // 5s cap plus up to 25% jitter.
        assert!(delay <= Duration::from_millis(6250));
    }

    #[test]
    fn transient_errors_are_retried() {
        let mut calls = 0;
        let config = RetryConfig::new(3).with_initial_delay(Duration::from_millis(1));
        let (result, retries) = retry_remote(&config, || {
            calls += 1;
            if calls < 3 {
                Err(RemoteError::unavailable("brief outage"))
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(retries, 2);
        assert_eq!(calls, 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let mut calls = 0;
        let config = RetryConfig::new(5).with_initial_delay(Duration::from_millis(1));
        let (result, retries): (Result<(), _>, _) = retry_remote(&config, || {
            calls += 1;
            Err(RemoteError::unauthorized("bad credentials"))
        });

        assert!(result.is_err());
        assert_eq!(retries, 0);
        assert_eq!(calls, 1);
    }

    #[test]
    fn retries_exhaust() {
        let mut calls = 0;
        let config = RetryConfig::new(3).with_initial_delay(Duration::from_millis(1));
        let (result, retries): (Result<(), _>, _) = retry_remote(&config, || {
            calls += 1;
            Err(RemoteError::timeout(Duration::from_secs(30)))
        });

        assert!(result.is_err());
        assert_eq!(retries, 2);
        assert_eq!(calls, 3);
    }
}
