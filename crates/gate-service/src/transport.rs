//! Backend construction for the bus and the parameter store.

use std::sync::Arc;

use gate_bus::{InMemoryBus, InMemoryStore, MessageBus, ParameterStore, RedisBus, RedisStore};
use tracing::{info, warn};

use crate::config::{TransportConfig, TransportKind};
use crate::error::ServiceResult;

/// Connected bus and store, ready for `RiskGateService::start`.
pub struct Transport {
    pub store: Arc<dyn ParameterStore>,
    pub bus: Arc<dyn MessageBus>,
}

impl Transport {
    /// Build the backends named by `config`.
    pub async fn connect(config: &TransportConfig) -> ServiceResult<Self> {
        match config.kind {
            TransportKind::Memory => {
                warn!("In-memory transport: no external producer can reach this instance");
                Ok(Self {
                    store: Arc::new(InMemoryStore::new()),
                    bus: Arc::new(InMemoryBus::new()),
                })
            }
            TransportKind::Redis => {
                let store = RedisStore::connect(&config.redis_url).await?;
                let bus = RedisBus::connect(&config.redis_url).await?;
                info!("Redis transport connected");
                Ok(Self {
                    store: Arc::new(store),
                    bus: Arc::new(bus),
                })
            }
        }
    }
}
