//! Retry pacing for property refreshes that fail.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter, reset on the first success.
#[derive(Debug, Clone)]
pub struct RefreshBackoff {
    base_ms: u64,
    max_ms: u64,
    failures: u32,
}

impl RefreshBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Count a failure and return how long to wait before the next attempt.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        delay_for(self.failures, self.base_ms, self.max_ms)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

fn delay_for(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(exponential_base).min(max_ms);

    // up to 10% jitter so many instances do not hit the config server in lockstep
    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = RefreshBackoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        assert!(backoff.record_failure() >= Duration::from_millis(100));
        assert!(backoff.record_failure() >= Duration::from_millis(200));
        for _ in 0..10 {
            backoff.record_failure();
        }
        let capped = backoff.record_failure();
        assert!(capped >= Duration::from_millis(1000));
        assert!(capped < Duration::from_millis(1100));
        assert_eq!(backoff.failures(), 13);

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
    }
}
