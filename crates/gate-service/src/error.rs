//! Service error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] gate_core::CoreError),

    #[error("Bus error: {0}")]
    Bus(#[from] gate_bus::BusError),

    #[error("Store error: {0}")]
    Store(#[from] gate_bus::StoreError),

    #[error("Risk error: {0}")]
    Risk(#[from] gate_risk::RiskError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] gate_telemetry::TelemetryError),

    #[error("Task {task} did not stop within {timeout_ms}ms")]
    ShutdownTimeout { task: &'static str, timeout_ms: u64 },
}

pub type ServiceResult<T> = Result<T, ServiceError>;
