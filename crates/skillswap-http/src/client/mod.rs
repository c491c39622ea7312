//! Document store HTTP client implementation.

mod config;
mod fetch;
mod native_network;
mod parser;
pub mod retry;
mod subscription;
mod utils;

pub use config::ClientConfig;
pub use fetch::StoreClient;
pub use native_network::NativeNetwork;
pub use parser::EventParser;
pub use retry::{parse_retry_after, Attempts, RetryPolicy};
pub use subscription::{KeepAliveConfig, Subscription};
pub use utils::*;
