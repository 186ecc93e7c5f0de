//! Service lifecycle: wires the refresher and the bus adapter around one
//! shared `RiskState`.

use std::sync::Arc;
use std::time::Duration;

use gate_bus::{MessageBus, ParameterStore};
use gate_risk::RiskState;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapter::BusAdapter;
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::refresher::{ParameterRefresher, RefresherConfig, RefresherHandle, RefresherPhase};

/// A running risk gating service instance.
pub struct RiskGateService {
    state: Arc<RiskState>,
    refresher: Option<RefresherHandle>,
    adapter: Option<JoinHandle<()>>,
    adapter_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl RiskGateService {
    /// Build state from `config`, spawn the refresher and subscribe the adapter.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(
        config: &ServiceConfig,
        store: Arc<dyn ParameterStore>,
        bus: Arc<dyn MessageBus>,
    ) -> ServiceResult<Self> {
        config.validate()?;
        let state = Arc::new(RiskState::new(config.limits()?));
        let shutdown_timeout = config.shutdown_timeout();

        let mut refresher = ParameterRefresher::new(
            RefresherConfig {
                interval: config.refresh_interval(),
                store_timeout: config.store_timeout(),
                key: config.channels.multiplier_key.clone(),
            },
            store,
            state.clone(),
            CancellationToken::new(),
        )
        .spawn();

        let subscription = match bus.subscribe(&config.channels.incoming).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(
                    channel = %config.channels.incoming,
                    error = %e,
                    "Subscribe failed, stopping refresher"
                );
                if let Err(stop_err) = refresher.stop(shutdown_timeout).await {
                    warn!(error = %stop_err, "Refresher cleanup after failed start");
                }
                return Err(e.into());
            }
        };

        let adapter_token = CancellationToken::new();
        let adapter = BusAdapter::new(state.clone(), bus, config.channels.validated.clone());
        let adapter = tokio::spawn(adapter.run(subscription, adapter_token.clone()));

        info!(
            incoming = %config.channels.incoming,
            validated = %config.channels.validated,
            multiplier_key = %config.channels.multiplier_key,
            refresh_interval_secs = config.refresh_interval_secs,
            max_daily_loss = config.max_daily_loss,
            "Risk gate service started"
        );

        Ok(Self {
            state,
            refresher: Some(refresher),
            adapter: Some(adapter),
            adapter_token,
            shutdown_timeout,
        })
    }

    /// Shared risk state, e.g. for recording realized PnL.
    pub fn risk_state(&self) -> Arc<RiskState> {
        self.state.clone()
    }

    /// Whether `stop()` has not yet been called.
    pub fn is_running(&self) -> bool {
        self.refresher.is_some() || self.adapter.is_some()
    }

    /// Current refresher phase, `None` once stopped.
    pub fn refresher_phase(&self) -> Option<RefresherPhase> {
        self.refresher.as_ref().map(RefresherHandle::phase)
    }

    /// Stop the refresher, then unsubscribe the adapter.
    ///
    /// Idempotent. Each task gets `shutdown_timeout_ms`; a task that overruns
    /// is aborted and the first such overrun is returned after both tasks
    /// have been dealt with.
    pub async fn stop(&mut self) -> ServiceResult<()> {
        if !self.is_running() {
            return Ok(());
        }
        info!("Stopping risk gate service");

        let mut result = Ok(());

        if let Some(mut refresher) = self.refresher.take() {
            if let Err(e) = refresher.stop(self.shutdown_timeout).await {
                result = Err(e);
            }
        }

        if let Some(adapter) = self.adapter.take() {
            self.adapter_token.cancel();
            let abort = adapter.abort_handle();
            match tokio::time::timeout(self.shutdown_timeout, adapter).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Bus adapter task ended abnormally"),
                Err(_) => {
                    abort.abort();
                    let timeout_ms = self.shutdown_timeout.as_millis() as u64;
                    error!(timeout_ms, "Bus adapter did not stop in time, aborted");
                    if result.is_ok() {
                        result = Err(ServiceError::ShutdownTimeout {
                            task: "bus_adapter",
                            timeout_ms,
                        });
                    }
                }
            }
        }

        info!("Risk gate service stopped");
        result
    }
}

impl Drop for RiskGateService {
    fn drop(&mut self) {
        // Dropped without stop(): let the tasks wind down on their own.
        self.adapter_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gate_bus::{BusError, BusResult, InMemoryBus, InMemoryStore, Subscription};

    struct NoSubscribeBus;

    #[async_trait]
    impl MessageBus for NoSubscribeBus {
        async fn subscribe(&self, channel: &str) -> BusResult<Subscription> {
            Err(BusError::SubscribeFailed {
                channel: channel.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        async fn publish(&self, _channel: &str, _payload: String) -> BusResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let config = ServiceConfig::default();
        let bus = Arc::new(InMemoryBus::new());
        let mut service =
            RiskGateService::start(&config, Arc::new(InMemoryStore::new()), bus.clone())
                .await
                .unwrap();
        assert!(service.is_running());
        assert_eq!(bus.subscriber_count("orders:incoming"), 1);

        service.stop().await.unwrap();
        assert!(!service.is_running());
        assert_eq!(service.refresher_phase(), None);
        assert_eq!(bus.subscriber_count("orders:incoming"), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_start() {
        let config = ServiceConfig {
            max_daily_loss: -1.0,
            ..ServiceConfig::default()
        };
        let result = RiskGateService::start(
            &config,
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryBus::new()),
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Config(_)) | Err(ServiceError::Core(_))));
    }

    #[tokio::test]
    async fn test_subscribe_failure_reports_bus_error() {
        let result = RiskGateService::start(
            &ServiceConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(NoSubscribeBus),
        )
        .await;
        assert!(matches!(
            result,
            Err(ServiceError::Bus(BusError::SubscribeFailed { .. }))
        ));
    }
}
