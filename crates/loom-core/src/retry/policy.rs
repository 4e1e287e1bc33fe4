//! Retry policy: decides backoff delays.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff policy for transient failures.
///
/// Delays grow exponentially from `base_delay` and are capped at
/// `max_delay`, so the sequence is non-decreasing and bounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// 2s base, doubling, capped at 10s.
    pub fn default_v1() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Policy without waits, for tests and synchronous tooling.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the `failures`-th failed attempt.
    ///
    /// delay = min(base_delay * multiplier^(failures - 1), max_delay)
    ///
    /// With base_delay=2s, multiplier=2.0, max_delay=10s:
    /// - failure 1: 2s
    /// - failure 2: 4s
    /// - failure 3: 8s
    /// - failure 4+: 10s
    pub fn next_delay(&self, failures: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = base_secs * self.multiplier.max(1.0).powi(exponent);
        let cap = self.max_delay.max(self.base_delay);
        if !delay_secs.is_finite() || delay_secs >= cap.as_secs_f64() {
            return cap;
        }
        Duration::from_secs_f64(delay_secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_v1()
    }
}
