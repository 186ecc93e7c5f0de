//! Bus adapter: inbound order requests through the validator to the
//! outbound channel.

use std::sync::Arc;
use std::time::Instant;

use gate_bus::{BusError, MessageBus, Subscription};
use gate_core::OrderRequest;
use gate_risk::{Decision, OrderValidator, RejectReason, RiskState};
use gate_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterOutcome {
    /// Approved and published to the outbound channel.
    Forwarded { original: i64, adjusted: i64 },
    /// Rejected by a risk rule.
    Rejected(RejectReason),
    /// Undecodable, or approved but lost on publish.
    Dropped,
}

/// Subscribes to order requests and forwards approved orders.
pub struct BusAdapter {
    state: Arc<RiskState>,
    validator: OrderValidator,
    bus: Arc<dyn MessageBus>,
    outbound: String,
}

impl BusAdapter {
    pub fn new(
        state: Arc<RiskState>,
        bus: Arc<dyn MessageBus>,
        outbound: impl Into<String>,
    ) -> Self {
        Self {
            state,
            validator: OrderValidator::new(),
            bus,
            outbound: outbound.into(),
        }
    }

    /// Decode, validate and forward a single payload.
    pub async fn handle_payload(&self, payload: &str) -> AdapterOutcome {
        let mut order = match OrderRequest::from_json(payload) {
            Ok(order) => order,
            Err(e) => {
                error!(
                    error = %e,
                    payload_len = payload.len(),
                    "Dropping undecodable order request"
                );
                Metrics::message_dropped("decode");
                return AdapterOutcome::Dropped;
            }
        };

        let started = Instant::now();
        let decision = self.validator.check(&mut order, &self.state);
        Metrics::check_latency(started.elapsed().as_secs_f64() * 1_000_000.0);
        Metrics::daily_loss(self.state.current_daily_loss());

        match decision {
            Decision::Reject(reason) => {
                warn!(
                    order_id = order.log_id(),
                    symbol = %order.symbol,
                    quantity = order.quantity,
                    reason = %reason,
                    "Order rejected"
                );
                Metrics::order_rejected(reason.label());
                AdapterOutcome::Rejected(reason)
            }
            Decision::Approve {
                original_quantity,
                adjusted_quantity,
                ..
            } => self.forward(&order, original_quantity, adjusted_quantity).await,
        }
    }

    async fn forward(&self, order: &OrderRequest, original: i64, adjusted: i64) -> AdapterOutcome {
        let payload = match order.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(order_id = order.log_id(), error = %e, "Failed to encode approved order");
                Metrics::message_dropped("encode");
                return AdapterOutcome::Dropped;
            }
        };

        match self.bus.publish(&self.outbound, payload).await {
            Ok(receivers) => {
                debug!(
                    order_id = order.log_id(),
                    symbol = %order.symbol,
                    quantity = adjusted,
                    receivers,
                    "Order forwarded"
                );
                Metrics::order_forwarded();
                AdapterOutcome::Forwarded { original, adjusted }
            }
            Err(e) => {
                error!(
                    order_id = order.log_id(),
                    channel = %self.outbound,
                    error = %e,
                    "Failed to publish approved order"
                );
                Metrics::message_dropped("publish");
                AdapterOutcome::Dropped
            }
        }
    }

    /// Process messages until `shutdown_token` fires or the channel closes.
    ///
    /// Dropping `subscription` on return unsubscribes.
    pub async fn run(self, mut subscription: Subscription, shutdown_token: CancellationToken) {
        info!(
            inbound = subscription.channel(),
            outbound = %self.outbound,
            "Bus adapter started"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown_token.cancelled() => break,
                msg = subscription.recv() => match msg {
                    Ok(payload) => {
                        self.handle_payload(&payload).await;
                    }
                    Err(BusError::Lagged { channel, skipped }) => {
                        warn!(
                            channel = %channel,
                            skipped,
                            "Subscriber lagged, order requests lost"
                        );
                        Metrics::messages_lagged(skipped);
                    }
                    Err(BusError::Closed(channel)) => {
                        info!(channel = %channel, "Inbound channel closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Unexpected bus error");
                        break;
                    }
                },
            }
        }

        info!(inbound = subscription.channel(), "Bus adapter stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gate_bus::{BusResult, InMemoryBus, ORDERS_INCOMING, ORDERS_VALIDATED};
    use gate_core::RiskLimits;
    use std::time::Duration;

    struct FailingBus;

    #[async_trait]
    impl MessageBus for FailingBus {
        async fn subscribe(&self, channel: &str) -> BusResult<Subscription> {
            Err(BusError::SubscribeFailed {
                channel: channel.to_string(),
                reason: "down".to_string(),
            })
        }

        async fn publish(&self, channel: &str, _payload: String) -> BusResult<usize> {
            Err(BusError::PublishFailed {
                channel: channel.to_string(),
                reason: "down".to_string(),
            })
        }
    }

    fn setup() -> (BusAdapter, Arc<RiskState>, Arc<InMemoryBus>) {
        let state = Arc::new(RiskState::new(RiskLimits::default()));
        let bus = Arc::new(InMemoryBus::new());
        let adapter = BusAdapter::new(state.clone(), bus.clone(), ORDERS_VALIDATED);
        (adapter, state, bus)
    }

    #[tokio::test]
    async fn test_approved_order_is_published_scaled() {
        let (adapter, state, bus) = setup();
        state.set(1.5);
        let mut out = bus.subscribe(ORDERS_VALIDATED).await.unwrap();

        let outcome = adapter
            .handle_payload(r#"{"id":"o-1","symbol":"NIFTY","quantity":100,"price":101.5}"#)
            .await;
        assert_eq!(
            outcome,
            AdapterOutcome::Forwarded {
                original: 100,
                adjusted: 150
            }
        );

        let published = OrderRequest::from_json(&out.recv().await.unwrap()).unwrap();
        assert_eq!(published.quantity, 150);
        assert_eq!(published.symbol, "NIFTY");
        assert_eq!(published.price, 101.5);
    }

    #[tokio::test]
    async fn test_malformed_payload_dropped() {
        let (adapter, _state, bus) = setup();
        let mut out = bus.subscribe(ORDERS_VALIDATED).await.unwrap();

        for payload in ["not json", r#"{"symbol":"X","price":1.0}"#, r#"{"quantity":"ten"}"#] {
            assert_eq!(adapter.handle_payload(payload).await, AdapterOutcome::Dropped);
        }

        let nothing = tokio::time::timeout(Duration::from_millis(50), out.recv()).await;
        assert!(nothing.is_err(), "nothing should be published");
    }

    #[tokio::test]
    async fn test_rejected_order_not_published() {
        let (adapter, state, bus) = setup();
        state.record_pnl(-6000.0);
        let mut out = bus.subscribe(ORDERS_VALIDATED).await.unwrap();

        let outcome = adapter
            .handle_payload(r#"{"symbol":"X","quantity":10,"price":1.0}"#)
            .await;
        assert!(matches!(
            outcome,
            AdapterOutcome::Rejected(RejectReason::DailyLossLimit { .. })
        ));

        let nothing = tokio::time::timeout(Duration::from_millis(50), out.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_publish_failure_drops_order() {
        let state = Arc::new(RiskState::new(RiskLimits::default()));
        let adapter = BusAdapter::new(state, Arc::new(FailingBus), ORDERS_VALIDATED);

        let outcome = adapter
            .handle_payload(r#"{"symbol":"X","quantity":10,"price":1.0}"#)
            .await;
        assert_eq!(outcome, AdapterOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_run_exits_on_cancel() {
        let (adapter, _state, bus) = setup();
        let sub = bus.subscribe(ORDERS_INCOMING).await.unwrap();
        let token = CancellationToken::new();
        let task = tokio::spawn(adapter.run(sub, token.clone()));

        token.cancel();
        tokio::time::timeout(Duration::from_millis(500), task)
            .await
            .expect("adapter should stop")
            .unwrap();
        assert_eq!(bus.subscriber_count(ORDERS_INCOMING), 0);
    }

    #[tokio::test]
    async fn test_run_exits_on_channel_close() {
        let (adapter, _state, bus) = setup();
        let sub = bus.subscribe(ORDERS_INCOMING).await.unwrap();
        let task = tokio::spawn(adapter.run(sub, CancellationToken::new()));

        bus.close(ORDERS_INCOMING);
        tokio::time::timeout(Duration::from_millis(500), task)
            .await
            .expect("adapter should stop on close")
            .unwrap();
    }
}
