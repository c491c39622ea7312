//! When and how long to wait before repeating a store request.

use crate::client::config::ClientConfig;
use std::time::Duration;

/// Statuses worth another attempt: timeouts, rate limits, gateway trouble.
pub const TRANSIENT_STATUSES: [u16; 6] = [408, 425, 429, 502, 503, 504];

const MAX_DELAY: Duration = Duration::from_secs(8);

/// Retry limits for one request. Delays double per attempt up to a cap,
/// and a `Retry-After` from the server wins over the computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        let base_delay = Duration::from_millis(config.retry_delay_ms);
        Self {
            max_retries: config.max_retries,
            base_delay,
            max_delay: MAX_DELAY.max(base_delay),
        }
    }

    /// Fail on the first error.
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn start(self) -> Attempts {
        Attempts {
            policy: self,
            retries: 0,
        }
    }
}

/// Attempt counter for a single logical request.
#[derive(Debug, Clone)]
pub struct Attempts {
    policy: RetryPolicy,
    retries: u32,
}

impl Attempts {
    /// Retries taken so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay before retrying a response with `status`, or `None` to give up.
    pub fn after_status(&mut self, status: u16, retry_after: Option<Duration>) -> Option<Duration> {
        if !TRANSIENT_STATUSES.contains(&status) {
            return None;
        }
        self.next_delay().map(|computed| retry_after.unwrap_or(computed))
    }

    /// Delay before retrying a transport failure, or `None` to give up.
    pub fn after_error(&mut self, retryable: bool) -> Option<Duration> {
        if !retryable {
            return None;
        }
        self.next_delay()
    }

    fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.policy.max_retries {
            return None;
        }
        let factor = 1u32 << self.retries.min(16);
        self.retries += 1;
        Some(
            self.policy
                .base_delay
                .saturating_mul(factor)
                .min(self.policy.max_delay),
        )
    }
}

/// `Retry-After` in delta-seconds. HTTP dates are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
