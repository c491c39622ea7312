//! Utility functions for the document store client.

use std::time::Duration;

pub fn is_retryable_status(status: u16) -> bool {
    super::retry::TRANSIENT_STATUSES.contains(&status)
}

pub fn is_access_denied_status(status: u16) -> bool {
    matches!(status, 401 | 403)
}

pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(500));
        assert!(is_access_denied_status(403));
        assert!(!is_access_denied_status(404));
    }
}
