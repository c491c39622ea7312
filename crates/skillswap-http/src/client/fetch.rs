//! Main document store client implementation.

use crate::client::config::ClientConfig;
use crate::client::native_network::NativeNetwork;
use crate::client::retry::{parse_retry_after, RetryPolicy};
use crate::client::subscription::{KeepAliveConfig, Subscription};
use crate::error::{Result, StoreError};
use crate::protocol::{self, headers};
use crate::traits::StoreNetwork;
use crate::types::{Method, StoreRequest, StoreResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Client for a path-addressed JSON document store.
#[derive(Clone)]
pub struct StoreClient {
    network: Arc<dyn StoreNetwork>,
    config: Arc<ClientConfig>,
    base_url: Arc<str>,
}

impl StoreClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, ClientConfig::default())
    }

    pub fn with_config(base_url: &str, config: ClientConfig) -> Result<Self> {
        let network = Arc::new(NativeNetwork::from_config(&config)?);
        Self::with_network(base_url, network, config)
    }

    /// Use a custom network, e.g. an in-memory one for tests.
    pub fn with_network(
        base_url: &str,
        network: Arc<dyn StoreNetwork>,
        config: ClientConfig,
    ) -> Result<Self> {
        // Validates the base once, up front.
        protocol::resource_url(base_url, "")?;
        Ok(StoreClient {
            network,
            config: Arc::new(config),
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn network(&self) -> &Arc<dyn StoreNetwork> {
        &self.network
    }

    /// Full URL of the resource at `path`.
    pub fn url(&self, path: &str) -> Result<String> {
        protocol::resource_url(&self.base_url, path)
    }

    /// Fetch the resource at `path`, retrying transient failures.
    pub async fn fetch(&self, path: &str, request: StoreRequest) -> Result<StoreResponse> {
        let url = self.url(path)?;
        self.fetch_url(&url, request).await
    }

    /// Fetch an absolute URL outside the store's tree, retrying transient failures.
    ///
    /// POST is not idempotent: a lost response may still have been committed,
    /// so it is sent once unless the request carries its own policy.
    pub async fn fetch_url(&self, url: &str, request: StoreRequest) -> Result<StoreResponse> {
        let mut attempts = request
            .retry
            .unwrap_or_else(|| self.default_policy(request.method))
            .start();

        loop {
            self.log_request(url, &request);

            let error = match self.network.fetch(url, request.clone()).await {
                Ok(response) if response.is_success() => {
                    self.log_response(url, &response);
                    return Ok(response);
                }
                Ok(response) => {
                    self.log_response(url, &response);
                    let retry_after = response
                        .header(headers::RETRY_AFTER)
                        .and_then(parse_retry_after);
                    match attempts.after_status(response.status, retry_after) {
                        Some(delay) => {
                            tracing::warn!(
                                "[Store] {} {} returned {} (retry {}), waiting {:?}",
                                request.method,
                                url,
                                response.status,
                                attempts.retries(),
                                delay
                            );
                            crate::client::utils::sleep(delay).await;
                            continue;
                        }
                        None => return Ok(response),
                    }
                }
                Err(e) => e,
            };

            let retryable = !matches!(error, StoreError::Aborted) && error.is_retryable();
            match attempts.after_error(retryable) {
                Some(delay) => {
                    tracing::warn!(
                        "[Store] {} {} failed (retry {}), waiting {:?}: {}",
                        request.method,
                        url,
                        attempts.retries(),
                        delay,
                        error
                    );
                    crate::client::utils::sleep(delay).await;
                }
                None => return Err(error),
            }
        }
    }

    fn default_policy(&self, method: Method) -> RetryPolicy {
        match method {
            Method::Post => RetryPolicy::never(),
            _ => RetryPolicy::from_config(&self.config),
        }
    }

    /// The same store with transport retries turned off, for callers that
    /// retry a whole sequence themselves.
    pub fn without_retries(&self) -> StoreClient {
        StoreClient {
            network: self.network.clone(),
            config: Arc::new(ClientConfig {
                max_retries: 0,
                ..(*self.config).clone()
            }),
            base_url: self.base_url.clone(),
        }
    }

    /// GET and decode. A `null` body decodes as `T`'s null form, so use
    /// `Option<_>` for resources that may be absent.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .fetch(path, StoreRequest::get())
            .await?
            .error_for_status()?;
        response.json()
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        value: &T,
    ) -> Result<StoreResponse> {
        let request = StoreRequest::json(Method::Put, value)?;
        self.fetch(path, request).await?.error_for_status()
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        value: &T,
    ) -> Result<StoreResponse> {
        let request = StoreRequest::json(Method::Post, value)?;
        self.fetch(path, request).await?.error_for_status()
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        value: &T,
    ) -> Result<StoreResponse> {
        let request = StoreRequest::json(Method::Patch, value)?;
        self.fetch(path, request).await?.error_for_status()
    }

    pub async fn delete(&self, path: &str) -> Result<StoreResponse> {
        self.fetch(path, StoreRequest::delete())
            .await?
            .error_for_status()
    }

    /// Open an event stream on `path`. Never retried; reconnecting is the caller's call.
    pub async fn subscribe(
        &self,
        path: &str,
        keep_alive: Option<KeepAliveConfig>,
    ) -> Result<Subscription> {
        let url = self.url(path)?;
        let request = StoreRequest::get().stream();
        self.log_request(&url, &request);
        let rx = self.network.subscribe(&url, request).await?;
        let subscription = Subscription::new(rx);
        Ok(match keep_alive {
            Some(config) => subscription.with_keep_alive(config),
            None => subscription,
        })
    }

    fn log_request(&self, url: &str, request: &StoreRequest) {
        if self.config.enable_logging {
            tracing::debug!(
                "[Store] -> {} {} ({} bytes)",
                request.method,
                url,
                request.body.len()
            );
        }
    }

    fn log_response(&self, url: &str, response: &StoreResponse) {
        if self.config.enable_logging {
            tracing::debug!(
                "[Store] <- {} {} ({} bytes)",
                response.status,
                url,
                response.body.len()
            );
        }
    }
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish()
    }
}
