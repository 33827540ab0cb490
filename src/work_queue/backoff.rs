//! Retry delay policy.

use chrono::Duration;

/// Base delay used when none is configured.
pub const DEFAULT_BACKOFF_BASE_SECS: i64 = 60;

/// Exponent cap; keeps the multiplication in range for absurd attempt counts.
const MAX_EXPONENT: u32 = 20;

/// Longest delay handed out, whatever the base. Retries are scheduled as
/// `now + delay`, which must stay inside chrono's range.
const MAX_DELAY_SECS: i64 = 365 * 24 * 60 * 60;

/// Exponential backoff without jitter: `2^attempts * base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_secs: i64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_BASE_SECS)
    }
}

impl Backoff {
    /// Non-positive bases are raised to one second.
    pub fn new(base_secs: i64) -> Self {
        Self {
            base_secs: base_secs.max(1),
        }
    }

    /// Delay before the retry that follows `prior_attempts` failed attempts.
    pub fn delay(&self, prior_attempts: u32) -> Duration {
        let factor = 1i64 << prior_attempts.min(MAX_EXPONENT);
        Duration::seconds(self.base_secs.saturating_mul(factor).min(MAX_DELAY_SECS))
    }
}
