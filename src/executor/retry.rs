use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn no_retry() -> Self {
        Self::new(1)
    }

    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn should_retry(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.effective_attempts()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RetryPolicy;

    #[test]
    fn default_is_five_immediate_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff, Duration::ZERO);
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
    }

    #[test]
    fn zero_budget_still_attempts_once() {
        let policy = RetryPolicy::new(0);
        assert_eq!(policy.effective_attempts(), 1);
        assert!(!policy.should_retry(1));
        assert!(RetryPolicy::no_retry().effective_attempts() == 1);
    }
}
