//! Core domain types for the risk gating service.
//!
//! This crate provides the types shared by every other crate:
//! - `OrderRequest`: Candidate order as published by the strategy layer
//! - `RiskLimits`: Static per-instance loss limits
//! - `CoreError`: Validation and decode errors

pub mod error;
pub mod limits;
pub mod order;

pub use error::{CoreError, Result};
pub use limits::RiskLimits;
pub use order::{OrderId, OrderRequest};
