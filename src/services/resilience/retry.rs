//! Retry policy.
//!
//! # Design Decisions
//! - Bounded attempts with a fixed wait between them
//! - Each attempt has its own deadline, so total latency has a hard cap
//! - Only transient dependency failures are retried (decided by the invoker)

use std::time::Duration;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    wait_duration: Duration,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            wait_duration: config.wait_duration,
            attempt_timeout: config.attempt_timeout,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Delay before the given 1-based attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.wait_duration
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_immediate() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            wait_duration: Duration::from_millis(100),
            attempt_timeout: Duration::from_secs(1),
        });

        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
    }

    #[test]
    fn at_least_one_attempt() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        });
        assert_eq!(policy.max_attempts(), 1);
    }
}
