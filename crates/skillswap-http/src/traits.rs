use crate::error::Result;
use crate::types::{StoreRequest, StoreResponse, StreamEvent};
use async_trait::async_trait;

/// Abstraction for network operations against the document store.
///
/// `url` is always a fully built resource URL (see [`crate::protocol::resource_url`]).
#[async_trait]
pub trait StoreNetwork: Send + Sync + 'static {
    async fn fetch(&self, url: &str, req: StoreRequest) -> Result<StoreResponse>;

    async fn subscribe(
        &self,
        url: &str,
        req: StoreRequest,
    ) -> Result<async_channel::Receiver<Result<StreamEvent>>>;
}
