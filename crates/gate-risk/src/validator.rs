//! Synchronous order validation.
//!
//! Rules, evaluated in order:
//! 1. Daily loss gate: current loss at or above the limit rejects everything.
//! 2. Input sanity: quantity must be positive, price finite and non-negative.
//! 3. Size scaling: `quantity = floor(quantity * multiplier)` using the
//!    cached multiplier. A result of zero is rejected.
//!
//! The validator reads only in-memory state. It never touches the store.

use std::fmt;

use gate_core::OrderRequest;
use tracing::{debug, trace};

use crate::state::RiskState;

/// Every integer up to this magnitude is exactly representable as `f64`.
const MAX_EXACT_QUANTITY: i64 = 1 << 53;

/// Why an order was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Daily loss limit reached.
    DailyLossLimit { current_loss: f64, max_loss: f64 },
    /// Quantity was zero or negative on arrival.
    InvalidQuantity { quantity: i64 },
    /// Price was negative or not a number.
    InvalidPrice { price: f64 },
    /// Scaling rounded the order down to nothing.
    ZeroAdjustedQuantity { quantity: i64, multiplier: f64 },
    /// Scaled quantity does not fit an integer size.
    QuantityOverflow { quantity: i64, multiplier: f64 },
}

impl RejectReason {
    /// Short stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DailyLossLimit { .. } => "daily_loss_limit",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::InvalidPrice { .. } => "invalid_price",
            Self::ZeroAdjustedQuantity { .. } => "zero_adjusted_quantity",
            Self::QuantityOverflow { .. } => "quantity_overflow",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailyLossLimit { .. } => write!(f, "daily loss limit reached"),
            Self::InvalidQuantity { quantity } => write!(f, "invalid quantity: {quantity}"),
            Self::InvalidPrice { price } => write!(f, "invalid price: {price}"),
            Self::ZeroAdjustedQuantity {
                quantity,
                multiplier,
            } => write!(
                f,
                "adjusted quantity is zero: {quantity} x {multiplier}"
            ),
            Self::QuantityOverflow {
                quantity,
                multiplier,
            } => write!(
                f,
                "adjusted quantity out of range: {quantity} x {multiplier}"
            ),
        }
    }
}

/// Outcome of a validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Order may proceed. The order's quantity now equals `adjusted_quantity`.
    Approve {
        original_quantity: i64,
        adjusted_quantity: i64,
        multiplier: f64,
    },
    /// Order must not proceed. The order is unmodified.
    Reject(RejectReason),
}

impl Decision {
    pub fn is_approve(&self) -> bool {
        matches!(self, Self::Approve { .. })
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, Self::Reject(_))
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Reject(reason) => Some(reason),
            Self::Approve { .. } => None,
        }
    }
}

/// Order validator.
///
/// Stateless: all inputs come from the order and the shared `RiskState`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderValidator;

impl OrderValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate an order and scale its quantity on approval.
    ///
    /// On `Reject` the order is left exactly as it arrived.
    pub fn check(&self, order: &mut OrderRequest, state: &RiskState) -> Decision {
        // Rule 1: must short-circuit everything else
        if state.is_daily_loss_breached() {
            return Decision::Reject(RejectReason::DailyLossLimit {
                current_loss: state.current_daily_loss(),
                max_loss: state.limits().max_daily_loss(),
            });
        }

        if order.quantity <= 0 {
            return Decision::Reject(RejectReason::InvalidQuantity {
                quantity: order.quantity,
            });
        }
        if !order.price.is_finite() || order.price < 0.0 {
            return Decision::Reject(RejectReason::InvalidPrice { price: order.price });
        }

        // Rule 2: single cached read, no I/O
        let multiplier = state.get();
        let adjusted = if multiplier == 1.0 {
            order.quantity
        } else {
            match Self::scale(order.quantity, multiplier) {
                Ok(adjusted) => adjusted,
                Err(reason) => return Decision::Reject(reason),
            }
        };

        let original = order.quantity;
        order.quantity = adjusted;

        if original != adjusted {
            debug!(
                order_id = order.log_id(),
                symbol = %order.symbol,
                original,
                adjusted,
                multiplier,
                "Order size scaled by risk multiplier"
            );
        } else {
            trace!(order_id = order.log_id(), multiplier, "Order size unchanged");
        }

        Decision::Approve {
            original_quantity: original,
            adjusted_quantity: adjusted,
            multiplier,
        }
    }

    /// `floor(quantity * multiplier)` for a positive quantity.
    ///
    /// Quantities above 2^53 are not exact as `f64`, so scaling them is
    /// rejected rather than silently rounded.
    fn scale(quantity: i64, multiplier: f64) -> Result<i64, RejectReason> {
        if quantity > MAX_EXACT_QUANTITY {
            return Err(RejectReason::QuantityOverflow {
                quantity,
                multiplier,
            });
        }

        let scaled = (quantity as f64 * multiplier).floor();
        if !scaled.is_finite() || scaled < 0.0 || scaled >= i64::MAX as f64 {
            return Err(RejectReason::QuantityOverflow {
                quantity,
                multiplier,
            });
        }

        match scaled as i64 {
            0 => Err(RejectReason::ZeroAdjustedQuantity {
                quantity,
                multiplier,
            }),
            adjusted => Ok(adjusted),
        }
    }
}
