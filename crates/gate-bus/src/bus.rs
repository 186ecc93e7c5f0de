//! Publish/subscribe message bus.
//!
//! Delivery is at-most-once: a subscriber that falls behind loses the
//! oldest messages and is told how many it skipped.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::DropGuard;
use tracing::{debug, trace};

use crate::error::{BusError, BusResult};

/// Default per-channel buffer for the in-memory bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Publish/subscribe bus with string payloads.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Subscribe to a channel.
    ///
    /// Dropping the returned `Subscription` unsubscribes.
    async fn subscribe(&self, channel: &str) -> BusResult<Subscription>;

    /// Publish a payload to a channel.
    ///
    /// Returns the number of subscribers that received it. Zero is not an
    /// error: nobody listening is normal for pub/sub.
    async fn publish(&self, channel: &str, payload: String) -> BusResult<usize>;
}

/// Live subscription to one channel.
pub struct Subscription {
    channel: String,
    rx: broadcast::Receiver<String>,
    /// Stops the backend's forwarding task when the subscription is dropped.
    _guard: Option<DropGuard>,
}

impl Subscription {
    /// Wrap a broadcast receiver.
    ///
    /// Bus backends that deliver through their own client forward into a
    /// broadcast channel and hand out the receiving side here.
    pub fn new(channel: impl Into<String>, rx: broadcast::Receiver<String>) -> Self {
        Self {
            channel: channel.into(),
            rx,
            _guard: None,
        }
    }

    /// Like `new`, with a guard whose drop tears down the forwarding side.
    pub fn with_guard(
        channel: impl Into<String>,
        rx: broadcast::Receiver<String>,
        guard: DropGuard,
    ) -> Self {
        Self {
            channel: channel.into(),
            rx,
            _guard: Some(guard),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receive the next payload.
    ///
    /// Returns `BusError::Lagged` when messages were skipped (the
    /// subscription stays usable) and `BusError::Closed` once every
    /// publisher is gone.
    pub async fn recv(&mut self) -> BusResult<String> {
        match self.rx.recv().await {
            Ok(payload) => Ok(payload),
            Err(broadcast::error::RecvError::Lagged(skipped)) => Err(BusError::Lagged {
                channel: self.channel.clone(),
                skipped,
            }),
            Err(broadcast::error::RecvError::Closed) => Err(BusError::Closed(self.channel.clone())),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish()
    }
}

/// In-process bus backed by one broadcast channel per channel name.
pub struct InMemoryBus {
    channels: DashMap<String, broadcast::Sender<String>>,
    capacity: usize,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    /// Create a bus with the default per-channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with a specific per-channel capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "bus channel capacity must be positive");
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of live subscribers on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Close a channel. Current subscribers see `BusError::Closed`.
    pub fn close(&self, channel: &str) {
        if self.channels.remove(channel).is_some() {
            debug!(channel, "Bus channel closed");
        }
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn subscribe(&self, channel: &str) -> BusResult<Subscription> {
        let rx = self.sender(channel).subscribe();
        debug!(channel, "Subscribed");
        Ok(Subscription::new(channel, rx))
    }

    async fn publish(&self, channel: &str, payload: String) -> BusResult<usize> {
        let Some(tx) = self.channels.get(channel).map(|tx| tx.clone()) else {
            trace!(channel, "No subscribers, message discarded");
            return Ok(0);
        };
        match tx.send(payload) {
            Ok(n) => {
                trace!(channel, receivers = n, "Published");
                Ok(n)
            }
            Err(_) => {
                trace!(channel, "No subscribers, message discarded");
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("orders:incoming").await.unwrap();

        let n = bus
            .publish("orders:incoming", "hello".to_string())
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(sub.recv().await.unwrap(), "hello");
        assert_eq!(sub.channel(), "orders:incoming");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = InMemoryBus::new();
        assert_eq!(bus.publish("nobody", "x".to_string()).await.unwrap(), 0);

        // Channel exists but the only subscriber left
        let sub = bus.subscribe("gone").await.unwrap();
        drop(sub);
        assert_eq!(bus.publish("gone", "x".to_string()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe("a").await.unwrap();
        let _b = bus.subscribe("b").await.unwrap();

        bus.publish("b", "for-b".to_string()).await.unwrap();
        bus.publish("a", "for-a".to_string()).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), "for-a");
    }

    #[tokio::test]
    async fn test_lagged_subscriber_reports_skipped() {
        let bus = InMemoryBus::with_capacity(2);
        let mut sub = bus.subscribe("c").await.unwrap();

        for i in 0..5 {
            bus.publish("c", i.to_string()).await.unwrap();
        }

        match sub.recv().await {
            Err(BusError::Lagged { skipped, .. }) => assert_eq!(skipped, 3),
            other => panic!("expected lag, got {other:?}"),
        }
        // Still usable after the lag
        assert_eq!(sub.recv().await.unwrap(), "3");
        assert_eq!(sub.recv().await.unwrap(), "4");
    }

    #[tokio::test]
    async fn test_close_ends_subscription() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("c").await.unwrap();
        assert_eq!(bus.subscriber_count("c"), 1);

        bus.close("c");
        assert!(matches!(sub.recv().await, Err(BusError::Closed(_))));
        assert_eq!(bus.subscriber_count("c"), 0);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let bus = InMemoryBus::new();
        let sub = bus.subscribe("c").await.unwrap();
        assert_eq!(bus.subscriber_count("c"), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count("c"), 0);
    }
}
