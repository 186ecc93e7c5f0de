//! Message buses with scripted failure behavior.

use async_trait::async_trait;
use gate_bus::{BusResult, InMemoryBus, MessageBus, Subscription};

/// In-memory bus whose publishes to `stuck_channel` never complete.
pub struct StuckPublishBus {
    pub inner: InMemoryBus,
    stuck_channel: String,
}

impl StuckPublishBus {
    pub fn new(stuck_channel: impl Into<String>) -> Self {
        Self {
            inner: InMemoryBus::new(),
            stuck_channel: stuck_channel.into(),
        }
    }
}

#[async_trait]
impl MessageBus for StuckPublishBus {
    async fn subscribe(&self, channel: &str) -> BusResult<Subscription> {
        self.inner.subscribe(channel).await
    }

    async fn publish(&self, channel: &str, payload: String) -> BusResult<usize> {
        if channel == self.stuck_channel {
            std::future::pending().await
        } else {
            self.inner.publish(channel, payload).await
        }
    }
}
