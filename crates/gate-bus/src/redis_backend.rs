//! Redis-backed bus and parameter store.
//!
//! GET and PUBLISH share one auto-reconnecting multiplexed connection. Each
//! subscription opens its own pub/sub connection and a task forwards its
//! messages into a broadcast channel, so consumers see a plain
//! `Subscription`.

use std::pin::pin;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{MessageBus, Subscription};
use crate::error::{BusError, BusResult, StoreError, StoreResult};
use crate::store::ParameterStore;

/// Per-subscription buffer between the pub/sub connection and the consumer.
const SUBSCRIPTION_CAPACITY: usize = 1024;

fn open_client(url: &str) -> Result<Client, String> {
    Client::open(url).map_err(|e| format!("invalid redis url: {e}"))
}

/// Parameter store reading string keys from Redis.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the Redis instance at `url` (`redis://host:port/db`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = open_client(url).map_err(StoreError::Unavailable)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!("Connected to Redis parameter store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl ParameterStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| StoreError::ReadFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Message bus over Redis pub/sub.
pub struct RedisBus {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisBus {
    /// Connect to the Redis instance at `url`.
    pub async fn connect(url: &str) -> BusResult<Self> {
        let client = open_client(url).map_err(BusError::Unavailable)?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        info!("Connected to Redis message bus");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn subscribe(&self, channel: &str) -> BusResult<Subscription> {
        let failed = |e: redis::RedisError| BusError::SubscribeFailed {
            channel: channel.to_string(),
            reason: e.to_string(),
        };
        let mut pubsub = self.client.get_async_pubsub().await.map_err(failed)?;
        pubsub.subscribe(channel).await.map_err(failed)?;

        let (tx, rx) = broadcast::channel(SUBSCRIPTION_CAPACITY);
        let token = CancellationToken::new();
        tokio::spawn(forward(pubsub, channel.to_string(), tx, token.clone()));

        debug!(channel, "Subscribed");
        Ok(Subscription::with_guard(channel, rx, token.drop_guard()))
    }

    async fn publish(&self, channel: &str, payload: String) -> BusResult<usize> {
        let mut conn = self.publisher.clone();
        conn.publish(channel, payload)
            .await
            .map_err(|e| BusError::PublishFailed {
                channel: channel.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Pump pub/sub messages into `tx` until the subscriber goes away or the
/// connection closes. Dropping `tx` surfaces as `BusError::Closed`.
async fn forward(
    pubsub: PubSub,
    channel: String,
    tx: broadcast::Sender<String>,
    token: CancellationToken,
) {
    let mut messages = pin!(pubsub.into_on_message());
    loop {
        tokio::select! {
            () = token.cancelled() => {
                debug!(channel = %channel, "Unsubscribed");
                break;
            }
            msg = messages.next() => match msg {
                Some(msg) => match msg.get_payload::<String>() {
                    Ok(payload) => {
                        // No receivers only happens while the guard is being dropped
                        let _ = tx.send(payload);
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Dropping non-UTF-8 payload");
                    }
                },
                None => {
                    warn!(channel = %channel, "Redis pub/sub connection closed");
                    break;
                }
            },
        }
    }
}
