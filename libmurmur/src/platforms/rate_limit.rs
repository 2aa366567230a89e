//! Backoff for HTTP 429 responses

use std::time::Duration;

/// Header carrying the unix second at which the rate-limit window resets
pub const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Longest wait honored for one 429, the length of X's rate-limit window
pub const MAX_BACKOFF_SECS: i64 = 15 * 60;

/// How long to wait before retrying a rate-limited request
///
/// Waits until the advertised reset plus one second. A missing or unparsable
/// header is treated as "reset now". The wait never exceeds
/// [`MAX_BACKOFF_SECS`] plus one second.
pub fn backoff_delay(reset_header: Option<&str>, now: i64) -> Duration {
    let reset = reset_header
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(now);
    let secs = reset.saturating_sub(now).clamp(0, MAX_BACKOFF_SECS) + 1;
    Duration::from_secs(secs as u64)
}

/// Retry budget for one logical request
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Whether another attempt is allowed after `retries_so_far` retries
    pub fn allows_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}
