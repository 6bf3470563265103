//! Exponential polling schedule with a ceiling.

use std::time::Duration;

/// Delay computation for confirmation polling: starts at `initial`,
/// doubles per attempt, never exceeds `ceiling`.
#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    /// First delay.
    pub initial: Duration,
    /// Upper bound.
    pub ceiling: Duration,
}

impl PollSchedule {
    /// Build a schedule from the initial delay and ceiling.
    pub fn new(initial: Duration, ceiling: Duration) -> Self {
        Self { initial, ceiling }
    }

    /// The delay before the given 1-based poll attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial
            .saturating_mul(1 << exponent)
            .min(self.ceiling)
    }
}
