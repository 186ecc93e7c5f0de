//! Risk gating service.
//!
//! Sits between signal generation and order execution:
//! - A background refresher keeps the dynamic risk multiplier current
//! - A bus adapter validates each inbound order request and forwards
//!   approved (possibly resized) orders downstream
//! - `RiskGateService` owns both tasks and their shutdown
//! - `Transport` connects the bus and store named in the config

pub mod adapter;
pub mod config;
pub mod error;
pub mod refresher;
pub mod service;
pub mod transport;

pub use adapter::{AdapterOutcome, BusAdapter};
pub use config::{
    ChannelConfig, ServiceConfig, TransportConfig, TransportKind, DEFAULT_CONFIG_PATH,
};
pub use error::{ServiceError, ServiceResult};
pub use refresher::{
    ParameterRefresher, RefreshFailure, RefreshOutcome, RefresherConfig, RefresherHandle,
    RefresherPhase,
};
pub use service::RiskGateService;
pub use transport::Transport;
