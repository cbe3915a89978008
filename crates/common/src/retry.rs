use std::time::Duration;

/// Bounded retry schedule: a fixed attempt budget with exponential backoff.
///
/// The delay is a pure function of the attempt index, so both the generation
/// and delivery clients share one schedule shape and tests can assert it
/// without sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after the given 1-based attempt fails: `base * 2^(n-1)`.
    ///
    /// The shift is clamped so pathological attempt counts cannot overflow.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift)
    }

    /// Whether another attempt remains after `attempt` (1-based) failed.
    #[must_use]
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2000));
    }

    #[test]
    fn delay_is_monotonically_non_decreasing() {
        let policy = RetryPolicy::default();
        let mut last = Duration::ZERO;
        for attempt in 1..64 {
            let delay = policy.delay_after(attempt);
            assert!(delay >= last, "attempt {attempt} regressed");
            last = delay;
        }
    }

    #[test]
    fn attempt_budget_is_exact() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert!(policy.has_attempts_left(1));
        assert!(policy.has_attempts_left(2));
        assert!(!policy.has_attempts_left(3));
    }

    #[test]
    fn zero_attempt_index_does_not_underflow() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_after(0), Duration::from_millis(500));
    }
}
