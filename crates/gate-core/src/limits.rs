//! Static risk limits.

use crate::error::{CoreError, Result};

/// Static loss limits for one gating service instance.
///
/// Fixed at construction; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    max_daily_loss: f64,
    max_per_trade_loss: f64,
}

impl RiskLimits {
    /// Create validated limits. Both values must be finite and positive.
    pub fn new(max_daily_loss: f64, max_per_trade_loss: f64) -> Result<Self> {
        if !max_daily_loss.is_finite() || max_daily_loss <= 0.0 {
            return Err(CoreError::InvalidLimits(format!(
                "max_daily_loss must be positive, got {max_daily_loss}"
            )));
        }
        if !max_per_trade_loss.is_finite() || max_per_trade_loss <= 0.0 {
            return Err(CoreError::InvalidLimits(format!(
                "max_per_trade_loss must be positive, got {max_per_trade_loss}"
            )));
        }
        Ok(Self {
            max_daily_loss,
            max_per_trade_loss,
        })
    }

    /// Cumulative realized loss at which all orders are rejected.
    pub fn max_daily_loss(&self) -> f64 {
        self.max_daily_loss
    }

    pub fn max_per_trade_loss(&self) -> f64 {
        self.max_per_trade_loss
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_loss: 5000.0,
            max_per_trade_loss: 1000.0,
        }
    }
}
