//! Retry decisions for rate-limited steps.
//!
//! A rate-limited step waits for the signalled duration (capped) and is
//! retried; every other failure is final. The number of retries per step
//! is configurable and defaults to one.

use std::time::Duration;

use tracing::{debug, instrument};

use super::outcome::FailureType;

/// Default retries of a rate-limited step.
pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 1;

/// Default cap on a single rate-limit wait (1 hour).
pub const DEFAULT_MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(3600);

/// Decision on whether to retry a failed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the step after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the step.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// How rate-limited steps are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    rate_limit_retries: u32,

    /// Longest single wait honoured.
    max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
            max_wait: DEFAULT_MAX_RATE_LIMIT_WAIT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings.
    #[must_use]
    pub fn new(rate_limit_retries: u32, max_wait: Duration) -> Self {
        Self {
            rate_limit_retries,
            max_wait,
        }
    }

    /// Retries allowed after the first attempt.
    #[must_use]
    pub fn rate_limit_retries(&self) -> u32 {
        self.rate_limit_retries
    }

    /// Longest single wait honoured.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Determines whether to retry a failed step.
    ///
    /// `attempt` is the attempt that just failed (1-indexed).
    #[instrument(skip(self), fields(retries = self.rate_limit_retries))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        let wait = match failure_type {
            FailureType::RateLimited(wait) => wait,
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Fatal => {
                return RetryDecision::DoNotRetry {
                    reason: "fatal failure - run cannot continue".to_string(),
                };
            }
        };

        if attempt > self.rate_limit_retries {
            debug!(attempt, "rate-limit retries exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!(
                    "still rate limited after {} retr{}",
                    self.rate_limit_retries,
                    if self.rate_limit_retries == 1 { "y" } else { "ies" }
                ),
            };
        }

        let delay = wait.min(self.max_wait);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_retries_rate_limit_once() {
        let policy = RetryPolicy::default();
        let limited = FailureType::RateLimited(Duration::from_secs(12));

        assert_eq!(
            policy.should_retry(limited, 1),
            RetryDecision::Retry {
                delay: Duration::from_secs(12),
                attempt: 2
            }
        );
        assert!(matches!(
            policy.should_retry(limited, 2),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_permanent_and_fatal_never_retry() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.should_retry(FailureType::Permanent, 1),
            RetryDecision::DoNotRetry { .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Fatal, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_wait_is_capped() {
        let policy = RetryPolicy::new(3, Duration::from_secs(60));
        assert_eq!(
            policy.should_retry(FailureType::RateLimited(Duration::from_secs(600)), 3),
            RetryDecision::Retry {
                delay: Duration::from_secs(60),
                attempt: 4
            }
        );
    }

    #[test]
    fn test_zero_retries_disables_retry() {
        let policy = RetryPolicy::new(0, Duration::from_secs(60));
        assert!(matches!(
            policy.should_retry(FailureType::RateLimited(Duration::from_secs(1)), 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }
}
