//! Configuration for the document store client.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum retries for failed requests.
    pub max_retries: u32,
    /// Base retry delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Connection timeout in seconds.
    pub connection_timeout_secs: u64,
    /// Request timeout in milliseconds. Does not apply to streams.
    pub request_timeout_ms: u64,
    /// Maximum idle connections kept per host.
    pub max_idle_per_host: usize,
    /// Log every request and response at debug level.
    pub enable_logging: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_retries: 3,
            retry_delay_ms: 1000,
            connection_timeout_secs: 30,
            request_timeout_ms: 30000,
            max_idle_per_host: 16,
            enable_logging: false,
            user_agent: concat!("skillswap/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
