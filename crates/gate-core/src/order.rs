//! Order request types and identifiers.
//!
//! `OrderRequest` is the wire shape of a candidate order on the
//! `orders:incoming` and `orders:validated` channels.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::Result;

/// Producer-assigned order identifier.
///
/// Optional on the wire. The gating service never generates one; it only
/// carries it through for log correlation downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Candidate order produced by the strategy layer.
///
/// `quantity` is signed so that a negative size on the wire decodes and is
/// rejected by the validator with a reason, instead of being dropped as a
/// decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderId>,
    pub symbol: String,
    pub quantity: i64,
    pub price: f64,
    /// Fields this service does not interpret (side, strategy tag, ...).
    /// Republished unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrderRequest {
    /// Create an order with no id and no extra fields.
    pub fn new(symbol: impl Into<String>, quantity: i64, price: f64) -> Self {
        Self {
            id: None,
            symbol: symbol.into(),
            quantity,
            price,
            extra: Map::new(),
        }
    }

    /// Attach a producer id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<OrderId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Decode from a JSON payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Encode to a JSON payload.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Id for log fields, `-` when the producer did not send one.
    pub fn log_id(&self) -> &str {
        self.id.as_ref().map_or("-", OrderId::as_str)
    }
}
