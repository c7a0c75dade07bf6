//! Backoff policy for calls into external dependencies.
//!
//! The model service refuses requests when saturated; callers retry with
//! bounded exponential backoff before classifying the failure as fatal.

use std::time::Duration;

/// Maximum attempts against a dependency (initial call + retries).
pub const DEPENDENCY_MAX_ATTEMPTS: u32 = 3;

/// Base delay before the first retry; doubles on each subsequent retry.
pub const DEPENDENCY_BASE_DELAY_MS: u64 = 250;

/// Delay to wait after a failed attempt (0-indexed).
///
/// Attempt 0 failed -> wait 250 ms, attempt 1 failed -> wait 500 ms, and so
/// on, capped only by the attempt limit.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(DEPENDENCY_BASE_DELAY_MS << attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        assert_eq!(backoff_delay(0), Duration::from_millis(250));
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_millis(1000));
    }
}
