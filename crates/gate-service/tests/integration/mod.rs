//! Integration tests for gate-service.
//!
//! These tests drive a full `RiskGateService` through the in-memory bus:
//! - Refresher behavior against healthy, flaky and hanging stores
//! - Order flow from the inbound to the outbound channel
//! - Start/stop lifecycle

pub mod common;
