//! Request parameters for document store calls.

use crate::client::retry::RetryPolicy;
use std::collections::BTreeMap;

/// HTTP methods understood by the document store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Put,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request against the document store.
#[derive(Clone, Debug, Default)]
pub struct StoreRequest {
    pub method: Method,
    pub body: bytes::Bytes,
    pub content_type: Option<String>,
    pub query: BTreeMap<String, String>,
    pub extra_headers: BTreeMap<String, String>,
    /// Ask for a `text/event-stream` response.
    pub stream: bool,
    /// Overrides the client's retry policy.
    pub retry: Option<RetryPolicy>,
}

impl StoreRequest {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get() -> Self {
        Self::new()
    }

    pub fn delete() -> Self {
        Self::new().with_method(Method::Delete)
    }

    /// Build a request carrying a JSON body.
    pub fn json<T: serde::Serialize + ?Sized>(
        method: Method,
        value: &T,
    ) -> crate::error::Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new()
            .with_method(method)
            .with_body(body)
            .with_content_type("application/json"))
    }

    pub fn stream(mut self) -> Self {
        self.stream = true;
        self
    }

    #[inline]
    pub fn is_stream(&self) -> bool {
        self.stream
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Parse the body back into JSON. An empty body reads as `null`.
    pub fn body_json(&self) -> crate::error::Result<serde_json::Value> {
        if self.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}
