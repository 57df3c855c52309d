//! Retry policy.

use std::time::Duration;

use crate::{ErrorKind, JobError, PoolError};

/// Upper bound for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Per-job retry policy.
///
/// After failed attempt `n` (zero-based) the pool waits
/// `base * backoff_factor^n` before the next attempt, so with the defaults
/// retries start after 1s, 2s, 4s.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub attempts: u32,
    pub backoff_factor: f64,
    pub base: Duration,
    /// Also retry [`ErrorKind::Render`] failures.
    pub retry_render_failures: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_factor: 2.0,
            base: Duration::from_secs(1),
            retry_render_failures: false,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            attempts: 0,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), PoolError> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(PoolError::InvalidBackoff(self.backoff_factor));
        }
        Ok(())
    }

    /// Delay before the attempt following failed attempt `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }

    /// Whether `error` after zero-based `attempt` earns another attempt.
    #[must_use]
    pub fn should_retry(&self, error: &JobError, attempt: u32) -> bool {
        if attempt >= self.attempts {
            return false;
        }
        match error.kind {
            ErrorKind::Cancelled => false,
            ErrorKind::Render if self.retry_render_failures => true,
            _ => error.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_delays_double() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            backoff_factor: 10.0,
            ..RetryPolicy::default()
        };

        assert_eq!(policy.delay(400), MAX_BACKOFF);
    }

    #[test]
    fn test_should_retry_respects_attempt_limit() {
        let policy = RetryPolicy::default();
        let err = JobError::timeout(Duration::from_secs(1));

        assert!(policy.should_retry(&err, 0));
        assert!(policy.should_retry(&err, 2));
        assert!(!policy.should_retry(&err, 3));
    }

    #[test]
    fn test_content_failures_not_retried() {
        let policy = RetryPolicy::default();

        assert!(!policy.should_retry(&JobError::render("bad diagram"), 0));
        assert!(!policy.should_retry(&JobError::compile("bad latex"), 0));
        assert!(!policy.should_retry(&JobError::cancelled(), 0));
    }

    #[test]
    fn test_render_retry_switch() {
        let policy = RetryPolicy {
            retry_render_failures: true,
            ..RetryPolicy::default()
        };

        assert!(policy.should_retry(&JobError::render("flaky"), 0));
        assert!(!policy.should_retry(&JobError::compile("bad latex"), 0));
    }

    #[test]
    fn test_validate_rejects_bad_backoff() {
        for factor in [0.5, f64::NAN, f64::INFINITY] {
            let policy = RetryPolicy {
                backoff_factor: factor,
                ..RetryPolicy::default()
            };
            assert!(policy.validate().is_err());
        }
        assert!(RetryPolicy::default().validate().is_ok());
    }
}
