use crate::config::PollingConfig;
use std::time::Duration;

/// Computes poll delays from the number of consecutive failed attempts.
///
/// `interval(n) = min(max, base * 2^n)`, so the idle cadence starts at
/// `base` and doubles after every failure until it saturates at `max`.
/// A separate fixed `active` interval is used right after a poll that
/// delivered messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_ms: u64,
    max_ms: u64,
    active_ms: u64,
}

/// Shortest delay a policy will ever produce.
pub const MIN_INTERVAL_MS: u64 = 1;

impl BackoffPolicy {
    /// Zero intervals are raised to [`MIN_INTERVAL_MS`] and `max_ms` to at
    /// least `base_ms`, so a cycle can never spin without sleeping.
    pub fn new(base_ms: u64, max_ms: u64, active_ms: u64) -> Self {
        let base_ms = base_ms.max(MIN_INTERVAL_MS);
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
            active_ms: active_ms.max(MIN_INTERVAL_MS),
        }
    }

    /// Delay before the next poll after `attempts` consecutive failures.
    pub fn interval(&self, attempts: u32) -> Duration {
        Duration::from_millis(compute_backoff(self.base_ms, self.max_ms, attempts))
    }

    /// Delay after a poll that returned one or more messages.
    pub fn active_interval(&self) -> Duration {
        Duration::from_millis(self.active_ms)
    }

    /// Delay after a poll that returned `delivered` messages without error.
    pub fn after_success(&self, delivered: usize) -> Duration {
        if delivered > 0 {
            self.active_interval()
        } else {
            self.interval(0)
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        PollingConfig::default().into()
    }
}

impl From<PollingConfig> for BackoffPolicy {
    fn from(config: PollingConfig) -> Self {
        Self::new(
            config.base_interval_ms,
            config.max_interval_ms,
            config.active_interval_ms,
        )
    }
}

fn compute_backoff(base_ms: u64, max_ms: u64, attempt: u32) -> u64 {
    let delay = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    delay.min(max_ms)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn backoff_computation() {
        let policy = BackoffPolicy::default();

        assert_eq!(policy.interval(0), Duration::from_millis(3_000));
        assert_eq!(policy.interval(1), Duration::from_millis(6_000));
        assert_eq!(policy.interval(2), Duration::from_millis(12_000));
        assert_eq!(policy.interval(3), Duration::from_millis(24_000));
        assert_eq!(policy.interval(4), Duration::from_millis(30_000)); // capped
        assert_eq!(policy.interval(100), Duration::from_millis(30_000));
        assert_eq!(policy.interval(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn backoff_is_monotonic() {
        let policy = BackoffPolicy::new(250, 45_000, 1_000);
        let mut previous = Duration::ZERO;
        for n in 0..80 {
            let current = policy.interval(n);
            assert!(current >= previous, "interval({n}) went down");
            assert!(current <= Duration::from_millis(45_000));
            previous = current;
        }
    }

    #[test]
    fn after_success_switches_to_active_cadence() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.after_success(3), Duration::from_millis(2_000));
        assert_eq!(policy.after_success(1), policy.active_interval());
        assert_eq!(policy.after_success(0), Duration::from_millis(3_000));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let policy = BackoffPolicy::new(0, 0, 0);
        assert_eq!(policy.interval(0), Duration::from_millis(MIN_INTERVAL_MS));
        assert_eq!(policy.interval(5), Duration::from_millis(MIN_INTERVAL_MS));
        assert_eq!(policy.active_interval(), Duration::from_millis(MIN_INTERVAL_MS));
        assert!(policy.after_success(1) > Duration::ZERO);
    }

    #[test]
    fn max_below_base_is_raised_to_base() {
        let policy = BackoffPolicy::new(5_000, 1_000, 500);
        assert_eq!(policy.interval(0), Duration::from_millis(5_000));
        assert_eq!(policy.interval(3), Duration::from_millis(5_000));
    }
}
