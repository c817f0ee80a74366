//! Retry delay for failed backend syncs
//!
//! No jitter is applied: Projects that fail together (e.g. during a backend
//! outage) are retried together.

use std::time::Duration;

/// Delay after the first failure
pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Upper bound for any retry delay (5 minutes)
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Retry count from which the delay stays flat at [`MAX_RETRY_DELAY`]
pub const MAX_RETRY_COUNT: u32 = 10;

/// Calculate exponential backoff delay for a retry counter
///
/// `delay = min(MAX_RETRY_DELAY, BASE_RETRY_DELAY * 2^retry_count)`, where
/// `retry_count` is the number of failures recorded *before* the current one.
pub fn calculate_backoff(retry_count: u32) -> Duration {
    if retry_count >= MAX_RETRY_COUNT {
        return MAX_RETRY_DELAY;
    }

    let delay_secs = BASE_RETRY_DELAY
        .as_secs()
        .saturating_mul(2_u64.saturating_pow(retry_count));

    Duration::from_secs(delay_secs).min(MAX_RETRY_DELAY)
}
