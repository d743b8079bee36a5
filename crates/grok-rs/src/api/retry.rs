//! Retry policy for model calls.
//!
//! A failed call is retried when its error string names a transient
//! condition: HTTP 429 or 5xx, or a network failure. Bad requests, auth
//! failures and a missing API key fail at once. Delays grow exponentially
//! up to [`RetryConfig::max_delay`] and are scaled by a fixed jitter cycle.

use std::time::Duration;

/// HTTP statuses worth another attempt.
const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Lowercase fragments of network-level failures.
const NETWORK_MARKERS: [&str; 8] = [
    "request failed:",
    "failed to read",
    "connection reset",
    "connection refused",
    "timed out",
    "timeout",
    "broken pipe",
    "network",
];

/// Fragments that make an error final regardless of anything else.
const PERMANENT_MARKERS: [&str; 9] = [
    "HTTP 400",
    "HTTP 401",
    "HTTP 403",
    "HTTP 404",
    "HTTP 422",
    "invalid",
    "bad request",
    "unauthorized",
    "XAI_API_KEY not set",
];

/// Jitter multipliers, cycled by attempt number.
const JITTER_CYCLE: [f64; 4] = [0.75, 0.90, 0.60, 0.85];

/// How often and how patiently to retry.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 fails immediately.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Scale delays by [`JITTER_CYCLE`].
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self::with_retries(0)
    }

    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Wait before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let grown = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = grown.min(self.max_delay.as_secs_f64());
        let factor = if self.jitter {
            JITTER_CYCLE[attempt as usize % JITTER_CYCLE.len()]
        } else {
            1.0
        };
        Duration::from_secs_f64(capped * factor)
    }
}

/// Whether `error` is worth retrying.
pub fn is_transient_error(error: &str) -> bool {
    if is_permanent_error(error) {
        return false;
    }
    if TRANSIENT_STATUSES
        .iter()
        .any(|status| error.contains(&format!("HTTP {status}")))
    {
        return true;
    }
    let lower = error.to_lowercase();
    NETWORK_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Whether `error` must never be retried.
pub fn is_permanent_error(error: &str) -> bool {
    PERMANENT_MARKERS.iter().any(|marker| error.contains(marker))
}
