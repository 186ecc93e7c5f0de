//! Prometheus metrics and structured logging for the risk gating service.
//!
//! - Prometheus metrics for order decisions, refresh cycles, check latency
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
