//! Exponential backoff for the inline rate-limit retry.
//!
//! ```text
//! delay(attempt) = min(base_delay * 2^attempt, cap_delay)
//! ```
//!
//! The batch processor only ever uses attempt 0 (one extra call per item per
//! batch pass). This is unrelated to the persisted `retry_count`, which
//! decides whether a later retry run considers the item at all.

use std::time::Duration;

/// Default base delay for the first backoff step.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Default upper bound for any backoff step.
pub const DEFAULT_CAP_DELAY: Duration = Duration::from_millis(60_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub cap_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            cap_delay: DEFAULT_CAP_DELAY,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, cap_delay: Duration) -> Self {
        Self {
            base_delay,
            cap_delay,
        }
    }

    /// Delay before the given attempt, capped at `cap_delay`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use retag_core::BackoffPolicy;
    ///
    /// let policy = BackoffPolicy::default();
    /// assert_eq!(policy.delay(0), Duration::from_secs(1));
    /// assert_eq!(policy.delay(3), Duration::from_secs(8));
    /// assert_eq!(policy.delay(10), Duration::from_secs(60));
    /// ```
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.cap_delay, |d| d.min(self.cap_delay))
    }
}
