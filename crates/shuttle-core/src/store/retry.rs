//! Retry policy: decides backoff delays and retry eligibility.

use std::time::Duration;

/// Exponential backoff capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay before a retry becomes eligible.
    ///
    /// `retry_count` is the count *after* the increment, so the first retry
    /// (count 1) waits `base * 2`:
    ///
    /// `delay = min(base * 2^retry_count, max_delay)`
    ///
    /// With base=1s, max=60s:
    /// - retry 1: 2s
    /// - retry 2: 4s
    /// - retry 5: 32s
    /// - retry 6+: 60s
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// A retry is allowed only while `retry_count < max_retries`.
    pub fn allows_retry(&self, retry_count: u32, max_retries: u32) -> bool {
        retry_count < max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}
