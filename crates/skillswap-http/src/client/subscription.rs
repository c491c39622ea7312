//! Long-lived event stream subscriptions.

use crate::error::{Result, StoreError};
use crate::types::StreamEvent;
use futures::Stream;
use std::time::{Duration, Instant};

/// Idle detection for streams whose server sends periodic keep-alives.
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    pub interval_secs: f64,
    pub timeout: Duration,
}

impl KeepAliveConfig {
    pub fn new(interval_secs: f64) -> Self {
        let timeout_secs = 1.2 * interval_secs + 3.0;
        Self {
            interval_secs,
            timeout: Duration::from_secs_f64(timeout_secs),
        }
    }
}

/// Receiving side of an event stream.
///
/// Dropping the subscription (or calling [`Subscription::close`]) closes the
/// channel; the background reader notices and releases the connection.
pub struct Subscription {
    receiver: async_channel::Receiver<Result<StreamEvent>>,
    keep_alive: Option<KeepAliveConfig>,
    last_activity: Instant,
}

impl Subscription {
    pub fn new(receiver: async_channel::Receiver<Result<StreamEvent>>) -> Self {
        Subscription {
            receiver,
            keep_alive: None,
            last_activity: Instant::now(),
        }
    }

    pub fn with_keep_alive(mut self, config: KeepAliveConfig) -> Self {
        self.keep_alive = Some(config);
        self
    }

    /// Wait for the next event. `None` means the stream ended.
    pub async fn next(&mut self) -> Option<Result<StreamEvent>> {
        if let Some(ref config) = self.keep_alive {
            let deadline = self.last_activity + config.timeout;
            tokio::select! {
                result = self.receiver.recv() => {
                    self.last_activity = Instant::now();
                    result.ok()
                }
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    // Next timeout is a full period away.
                    self.last_activity = Instant::now();
                    Some(Err(StoreError::Timeout))
                }
            }
        } else {
            let result = self.receiver.recv().await.ok();
            self.last_activity = Instant::now();
            result
        }
    }

    pub fn is_idle_timeout(&self) -> bool {
        match self.keep_alive {
            Some(ref config) => self.last_activity.elapsed() > config.timeout,
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }

    pub fn close(&mut self) {
        self.receiver.close();
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEvent>> {
        futures::stream::unfold(self, |mut sub| async move {
            let item = sub.next().await?;
            Some((item, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_alive_timeout() {
        let config = KeepAliveConfig::new(30.0);
        assert_eq!(config.timeout, Duration::from_secs(39));
    }

    #[tokio::test]
    async fn test_next_yields_events_then_none() {
        let (tx, rx) = async_channel::bounded(4);
        let mut sub = Subscription::new(rx);
        tx.send(Ok(StreamEvent::new("put", "1"))).await.unwrap();
        drop(tx);
        assert_eq!(sub.next().await.unwrap().unwrap().data, "1");
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_idle_stream_times_out() {
        let (_tx, rx) = async_channel::bounded::<Result<StreamEvent>>(4);
        let config = KeepAliveConfig {
            interval_secs: 0.0,
            timeout: Duration::from_millis(20),
        };
        let mut sub = Subscription::new(rx).with_keep_alive(config);
        assert!(matches!(sub.next().await, Some(Err(StoreError::Timeout))));
    }

    #[tokio::test]
    async fn test_close_closes_channel() {
        let (tx, rx) = async_channel::bounded::<Result<StreamEvent>>(4);
        let mut sub = Subscription::new(rx);
        sub.close();
        assert!(sub.is_closed());
        assert!(tx.send(Ok(StreamEvent::default())).await.is_err());
    }
}
