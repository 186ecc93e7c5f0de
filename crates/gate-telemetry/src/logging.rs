//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: debug for the gate crates, info elsewhere.
const DEFAULT_FILTER: &str = "info,gate=debug";

fn production() -> bool {
    std::env::var("RUST_ENV").is_ok_and(|v| v == "production")
}

/// Install the global subscriber.
///
/// Production (`RUST_ENV=production`) emits one JSON object per event with
/// the span stack attached, for log shippers. Any other environment gets
/// multi-line human output with thread names. Fails if a global subscriber
/// was already installed.
pub fn init_logging() -> TelemetryResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if production() {
        registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().pretty().with_target(true).with_thread_names(true))
            .try_init()
    };

    installed.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
