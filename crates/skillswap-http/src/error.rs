//! Error types for document store operations.

use thiserror::Error;

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while talking to the document store.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event stream parse error: {0}")]
    EventParse(String),

    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error("Operation timed out")]
    Timeout,

    #[error("Request aborted")]
    Aborted,

    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Check if this error is retryable.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Status { status, .. } => crate::client::is_retryable_status(*status),
            StoreError::Http(_) | StoreError::Timeout | StoreError::Io(_) => true,
            _ => false,
        }
    }

    /// Check if this is an access denied error.
    #[inline]
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, StoreError::Status { status: 401 | 403, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        assert!(StoreError::Timeout.is_retryable());
    }

    #[test]
    fn test_status_503_is_retryable() {
        let err = StoreError::Status {
            status: 503,
            body: "Service Unavailable".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_status_400_not_retryable() {
        let err = StoreError::Status {
            status: 400,
            body: "bad".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_access_denied_401() {
        let err = StoreError::Status {
            status: 401,
            body: "Permission denied".into(),
        };
        assert!(err.is_access_denied());
        assert!(!StoreError::Aborted.is_access_denied());
    }
}
