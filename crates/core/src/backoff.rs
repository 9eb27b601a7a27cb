//! Exponential backoff policy for retried outbound calls.
//!
//! The delay after attempt `n` grows geometrically from an initial value,
//! is capped at a maximum, and is widened by a random jitter fraction so
//! that many callers failing at once do not retry in lockstep.

use std::time::Duration;

use rand::Rng;

/// Tunable parameters for the retry strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on the computed delay (before jitter).
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Each delay is widened by a random factor in
    /// `[1.0, 1.0 + jitter_fraction]`.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_fraction: 0.25,
        }
    }
}

impl RetryPolicy {
    /// The un-jittered delay after the `attempt`-th failure (1-based).
    ///
    /// `initial_delay * multiplier^(attempt-1)`, clamped to `max_delay`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exp as i32);
        Duration::from_millis(ms as u64).min(self.max_delay)
    }

    /// The jittered delay after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        let spread: f64 = rand::rng().random_range(0.0..=self.jitter_fraction.max(0.0));
        base.mul_f64(1.0 + spread)
    }
}
