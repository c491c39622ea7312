pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod protocol;
pub mod traits;
pub mod types;

pub use client::StoreClient;
pub use error::{Result, StoreError};
pub use traits::StoreNetwork;
pub use types::{StoreRequest, StoreResponse, StreamEvent};
