use crate::client::config::ClientConfig;
use crate::client::parser::EventParser;
use crate::error::{Result, StoreError};
use crate::protocol::{headers, APPLICATION_JSON, EVENT_STREAM};
use crate::traits::StoreNetwork;
use crate::types::{Method, StoreRequest, StoreResponse, StreamEvent};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

/// How often an idle stream reader checks whether its consumer went away.
const CLOSED_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// `reqwest`-backed network.
///
/// Streams use a separate client without a total request timeout, since an
/// event stream never finishes on its own.
pub struct NativeNetwork {
    client: Client,
    stream_client: Client,
}

impl NativeNetwork {
    pub fn new(client: Client, stream_client: Client) -> Self {
        Self {
            client,
            stream_client,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connection_timeout_secs))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connection_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Self::new(client, stream_client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn request_builder(
        &self,
        client: &Client,
        url: &str,
        request: &StoreRequest,
    ) -> Result<reqwest::RequestBuilder> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut url = url::Url::parse(url).map_err(|e| StoreError::Config(e.to_string()))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &request.query {
                pairs.append_pair(k, v);
            }
        }

        let mut req_builder = client.request(method, url);

        for (k, v) in &request.extra_headers {
            req_builder = req_builder.header(k, v);
        }

        if !request.body.is_empty() {
            let ct = request.content_type.as_deref().unwrap_or(APPLICATION_JSON);
            req_builder = req_builder
                .header(headers::CONTENT_TYPE, ct)
                .body(request.body.clone());
        }

        if request.stream {
            req_builder = req_builder
                .header(headers::ACCEPT, EVENT_STREAM)
                .header(headers::CACHE_CONTROL, "no-cache");
        }

        Ok(req_builder)
    }
}

fn collect_headers(response: &reqwest::Response) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for (k, v) in response.headers() {
        if let Ok(val) = v.to_str() {
            headers.insert(k.as_str().to_lowercase(), val.to_string());
        }
    }
    headers
}

#[async_trait]
impl StoreNetwork for NativeNetwork {
    async fn fetch(&self, url: &str, request: StoreRequest) -> Result<StoreResponse> {
        let req_builder = self.request_builder(&self.client, url, &request)?;

        tracing::debug!("[Store-Out] {} {}", request.method, url);

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout
            } else {
                StoreError::Http(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = collect_headers(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        Ok(StoreResponse {
            status,
            headers,
            body,
        })
    }

    async fn subscribe(
        &self,
        url: &str,
        mut request: StoreRequest,
    ) -> Result<async_channel::Receiver<Result<StreamEvent>>> {
        request.stream = true;
        let req_builder = self.request_builder(&self.stream_client, url, &request)?;

        tracing::info!("[SSE-Out] GET {}", url);

        let response = req_builder
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        tracing::info!("[SSE] Response status: {}", status);
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        let (tx, rx) = async_channel::bounded(100);
        let mut stream = response.bytes_stream();
        let url = url.to_string();

        tokio::spawn(async move {
            let mut parser = EventParser::new();
            let mut closed_check = tokio::time::interval(CLOSED_CHECK_INTERVAL);

            loop {
                let chunk_res = tokio::select! {
                    chunk = stream.next() => match chunk {
                        Some(chunk) => chunk,
                        None => break,
                    },
                    _ = closed_check.tick() => {
                        if tx.is_closed() {
                            tracing::debug!("[SSE] Consumer gone, dropping stream for {}", url);
                            break;
                        }
                        continue;
                    }
                };

                match chunk_res {
                    Ok(chunk) => match parser.feed(&chunk) {
                        Ok(events) => {
                            tracing::trace!("[SSE] Parsed {} events", events.len());
                            for event in events {
                                if tx.send(Ok(event)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!("[SSE] Parse error: {}", e);
                            if tx.send(Err(e)).await.is_err() {
                                return;
                            }
                        }
                    },
                    Err(e) => {
                        tracing::error!("[SSE] Stream error: {}", e);
                        let _ = tx.send(Err(StoreError::Http(e.to_string()))).await;
                        break;
                    }
                }
            }
            tracing::debug!("[SSE] Stream ended for {}", url);
        });

        Ok(rx)
    }
}
