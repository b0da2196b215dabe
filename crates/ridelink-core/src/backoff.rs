//! Reconnect delay policy.
//!
//! `delay(k) = min(ceil(base * factor^k) + jitter, max)` where `k` is the
//! number of attempts already made and `jitter` is drawn uniformly from
//! `[0, jitter_max)` whole milliseconds. Rounding the exponential term up
//! keeps every delay inside `[base * factor^k, base * factor^k + jitter_max)`.

use std::time::Duration;

/// Bounded exponential backoff with additive jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    factor: f64,
    jitter: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a policy.
    pub fn new(base: Duration, factor: f64, jitter: Duration, max: Duration) -> Self {
        Self { base, factor, jitter, max }
    }

    /// Deterministic part of the delay for `attempt` (0-indexed), clamped to
    /// the ceiling.
    pub fn floor(&self, attempt: u32) -> Duration {
        let max_ms = self.max.as_millis() as f64;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let ms = (self.base.as_millis() as f64 * self.factor.powi(exponent)).ceil();

        if !ms.is_finite() || ms >= max_ms {
            return self.max;
        }

        Duration::from_millis(ms as u64)
    }

    /// Full delay for `attempt`, using `entropy` to pick the jitter.
    pub fn delay(&self, attempt: u32, entropy: u64) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 { 0 } else { entropy % jitter_ms };

        (self.floor(attempt) + Duration::from_millis(jitter)).min(self.max)
    }
}
