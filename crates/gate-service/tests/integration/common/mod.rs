//! Shared helpers for service integration tests.

pub mod buses;
pub mod stores;

use std::sync::Arc;
use std::time::Duration;

use gate_bus::{InMemoryBus, MessageBus, ParameterStore, Subscription};
use gate_service::{RiskGateService, ServiceConfig};

/// Config with a fast refresh interval and short timeouts.
pub fn fast_config(refresh_interval_secs: f64) -> ServiceConfig {
    ServiceConfig {
        refresh_interval_secs,
        store_timeout_ms: 50,
        shutdown_timeout_ms: 500,
        ..ServiceConfig::default()
    }
}

/// A started service plus handles to its bus.
pub struct Harness {
    pub service: RiskGateService,
    pub bus: Arc<InMemoryBus>,
    pub validated: Subscription,
    pub config: ServiceConfig,
}

impl Harness {
    pub async fn start(config: ServiceConfig, store: Arc<dyn ParameterStore>) -> Self {
        let bus = Arc::new(InMemoryBus::new());
        let validated = bus
            .subscribe(&config.channels.validated)
            .await
            .expect("subscribe validated");
        let service = RiskGateService::start(&config, store, bus.clone())
            .await
            .expect("service should start");
        Self {
            service,
            bus,
            validated,
            config,
        }
    }

    /// Publish a raw payload on the inbound channel.
    pub async fn send(&self, payload: &str) {
        self.bus
            .publish(&self.config.channels.incoming, payload.to_string())
            .await
            .expect("publish inbound");
    }

    /// Next outbound payload, or `None` if nothing arrives within `wait`.
    pub async fn next_validated(&mut self, wait: Duration) -> Option<String> {
        tokio::time::timeout(wait, self.validated.recv())
            .await
            .ok()
            .and_then(Result::ok)
    }
}

/// Poll `cond` every 10ms until it holds or `deadline` passes.
pub async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(deadline, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
