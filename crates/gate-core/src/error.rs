//! Error types for gate-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid limits: {0}")]
    InvalidLimits(String),

    #[error("Order decode error: {0}")]
    OrderDecode(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
