//! Channel and key names shared with the other pipeline components.

/// Order requests from the strategy layer (subscribed).
pub const ORDERS_INCOMING: &str = "orders:incoming";

/// Orders approved by the gate (published).
pub const ORDERS_VALIDATED: &str = "orders:validated";

/// Store key holding the dynamic risk multiplier as a decimal string.
pub const RISK_MULTIPLIER_KEY: &str = "ai:risk_multiplier";
