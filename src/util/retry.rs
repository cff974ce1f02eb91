/// Exponential backoff with full jitter for re-running failed report dates.
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts per report date, the first run included.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before attempt number `attempt` (0 = first run, no delay).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let shift = u32::try_from(attempt - 1).unwrap_or(u32::MAX);
        let exponential_delay = self
            .base_delay_ms
            .saturating_mul(1_u64.checked_shl(shift).unwrap_or(u64::MAX));
        let capped_delay = exponential_delay.min(self.max_delay_ms);

        let jittered_delay = if capped_delay > 0 {
            rand::rng().random_range(0..=capped_delay)
        } else {
            0
        };

        Duration::from_millis(jittered_delay)
    }

    #[must_use]
    pub const fn can_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}
