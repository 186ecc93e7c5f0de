//! Prometheus metrics for the risk gating service.
//!
//! Covers:
//! - Order decisions (forwarded / rejected / dropped) and reject reasons
//! - Refresh cycles and the currently cached multiplier
//! - Validation latency
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. Registration only fails
//! on duplicate metric names, a programming error that should crash at
//! startup. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_int_gauge, CounterVec,
    Encoder, Gauge, Histogram, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Orders handled by the bus adapter.
/// Labels: outcome (forwarded/rejected/dropped)
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gate_orders_total",
        "Orders handled by the risk gate",
        &["outcome"]
    )
    .unwrap()
});

/// Rejections by reason.
pub static ORDER_REJECTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gate_order_rejects_total",
        "Orders rejected by the risk gate",
        &["reason"]
    )
    .unwrap()
});

/// Messages dropped before validation or after it.
/// Labels: stage (decode/publish/lagged)
pub static MESSAGES_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gate_messages_dropped_total",
        "Bus messages dropped without reaching the outbound channel",
        &["stage"]
    )
    .unwrap()
});

/// Refresh cycles.
/// Labels: result (updated/absent/failed)
pub static REFRESH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gate_refresh_total",
        "Risk multiplier refresh cycles",
        &["result"]
    )
    .unwrap()
});

/// Currently cached risk multiplier.
pub static RISK_MULTIPLIER: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("gate_risk_multiplier", "Cached dynamic risk multiplier").unwrap()
});

/// Seconds since the cached multiplier was last refreshed.
pub static MULTIPLIER_AGE_SECONDS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "gate_multiplier_age_seconds",
        "Seconds since the cached risk multiplier was last refreshed"
    )
    .unwrap()
});

/// Net realized loss for the session.
pub static DAILY_LOSS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("gate_daily_loss", "Net realized loss for the current session").unwrap()
});

/// Whether the refresher task is running (1) or stopped (0).
pub static REFRESHER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "gate_refresher_running",
        "Risk multiplier refresher running (1=running)"
    )
    .unwrap()
});

/// Validation latency in microseconds.
pub static CHECK_LATENCY_US: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "gate_check_latency_us",
        "Order validation latency in microseconds",
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0, 1000.0]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record an order forwarded to the validated channel.
    pub fn order_forwarded() {
        ORDERS_TOTAL.with_label_values(&["forwarded"]).inc();
    }

    /// Record an order rejected by a risk rule.
    pub fn order_rejected(reason: &str) {
        ORDERS_TOTAL.with_label_values(&["rejected"]).inc();
        ORDER_REJECTS_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a message dropped at `stage`.
    pub fn message_dropped(stage: &str) {
        ORDERS_TOTAL.with_label_values(&["dropped"]).inc();
        MESSAGES_DROPPED_TOTAL.with_label_values(&[stage]).inc();
    }

    /// Record messages lost to subscriber lag.
    pub fn messages_lagged(skipped: u64) {
        MESSAGES_DROPPED_TOTAL
            .with_label_values(&["lagged"])
            .inc_by(skipped as f64);
    }

    /// Record a refresh cycle result.
    pub fn refresh(result: &str) {
        REFRESH_TOTAL.with_label_values(&[result]).inc();
    }

    /// Update the cached multiplier gauge.
    pub fn risk_multiplier(value: f64) {
        RISK_MULTIPLIER.set(value);
    }

    /// Update the multiplier age gauge.
    pub fn multiplier_age(seconds: f64) {
        MULTIPLIER_AGE_SECONDS.set(seconds);
    }

    /// Update the daily loss gauge.
    pub fn daily_loss(value: f64) {
        DAILY_LOSS.set(value);
    }

    /// Set refresher running state.
    pub fn refresher_running(running: bool) {
        REFRESHER_RUNNING.set(i64::from(running));
    }

    /// Record validation latency.
    pub fn check_latency(latency_us: f64) {
        CHECK_LATENCY_US.observe(latency_us);
    }

    /// Encode all registered metrics in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
