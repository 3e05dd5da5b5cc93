use std::time::Duration;

use crate::FailureKind;

const MAX_DELAY_SECS: f64 = 300.0;

/// Bounded retry schedule for one fetch call.
///
/// `max_attempts` counts every request, the first one included, so a value of
/// 1 disables retrying. The delay before attempt `n + 1` is
/// `base_delay * backoff_factor^(n - 1)`; a factor of 1.0 gives a flat delay.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(1),
            backoff_factor: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_backoff(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = if backoff_factor.is_finite() && backoff_factor >= 1.0 {
            backoff_factor
        } else {
            1.0
        };
        self
    }

    pub fn is_retryable(&self, kind: &FailureKind) -> bool {
        kind.is_transient()
    }

    /// Decide whether another request follows attempt number `attempt`
    /// (1-based) that failed with `kind`.
    pub fn should_retry(&self, attempt: u32, kind: &FailureKind) -> bool {
        attempt < self.max_attempts && self.is_retryable(kind)
    }

    /// Sleep to apply after attempt number `attempt` (1-based) failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let factor = if self.backoff_factor.is_finite() {
            self.backoff_factor.max(1.0)
        } else {
            1.0
        };
        let base = self.base_delay.as_secs_f64();
        let secs = (base * factor.powi(exponent)).min(MAX_DELAY_SECS.max(base));
        Duration::from_secs_f64(secs)
    }
}
