//! # Retry Policy
//!
//! Exponential backoff with jitter for ledger submission. Only the delay
//! arithmetic lives here; the retry loop itself sits in the client where
//! per-attempt categorization and breaker accounting happen.

use std::time::Duration;

use rand::Rng;

/// Submission retry tuning.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff base; the delay after attempt `n` is `base × 2^(n−1)`.
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter added to every delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// The delay to sleep after the given 1-based failed attempt.
    ///
    /// Rate-limited responses stretch the exponential part by another
    /// factor of two before jitter is applied.
    pub fn backoff_delay(&self, attempt: u32, rate_limited: bool) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let mut delay = self.base_delay.saturating_mul(1 << exponent);
        if rate_limited {
            delay = delay.saturating_mul(2);
        }
        delay + self.sample_jitter()
    }

    fn sample_jitter(&self) -> Duration {
        let bound = self.jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}
