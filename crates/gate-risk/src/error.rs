//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Invalid multiplier: {raw:?} - {reason}")]
    InvalidMultiplier { raw: String, reason: String },
}

pub type RiskResult<T> = Result<T, RiskError>;
