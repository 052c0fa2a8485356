//! Retry policy for idempotent provider failures.
//!
//! 429 honors any `Retry-After` directive; 5xx and transport failures wait
//! `base × 2^attempt` plus jitter, capped. Permanent errors never retry.

use std::time::Duration;

use rand::Rng;

use crate::error::LlmError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` when the error is permanent
    /// or attempts are exhausted. `attempt` is zero-based.
    pub fn backoff(&self, error: &LlmError, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts || !error.is_retryable() {
            return None;
        }

        let delay = match error {
            LlmError::RateLimited {
                retry_after: Some(secs),
            } => Duration::from_secs(*secs),
            _ => {
                let exp = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                let jitter_ms = if self.jitter.is_zero() {
                    0
                } else {
                    rand::thread_rng().gen_range(0..self.jitter.as_millis() as u64)
                };
                exp + Duration::from_millis(jitter_ms)
            }
        };

        Some(delay.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            jitter: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = no_jitter();
        let err = LlmError::Upstream {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(policy.backoff(&err, 0), Some(Duration::from_millis(500)));
        assert_eq!(policy.backoff(&err, 1), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn backoff_honors_retry_after() {
        let policy = no_jitter();
        let err = LlmError::RateLimited {
            retry_after: Some(7),
        };
        assert_eq!(policy.backoff(&err, 0), Some(Duration::from_secs(7)));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            jitter: Duration::ZERO,
            ..Default::default()
        };
        let err = LlmError::Transport("reset".to_string());
        assert_eq!(policy.backoff(&err, 8), Some(policy.max_delay));
    }

    #[test]
    fn permanent_errors_get_no_backoff() {
        let policy = no_jitter();
        let err = LlmError::Upstream {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(policy.backoff(&err, 0), None);
    }

    #[test]
    fn exhausted_attempts_get_no_backoff() {
        let policy = no_jitter();
        let err = LlmError::Transport("reset".to_string());
        assert_eq!(policy.backoff(&err, 2), None);
    }
}
