//! Transport seams for the risk gating service.
//!
//! The gating service talks to two shared collaborators:
//! - A publish/subscribe bus carrying order requests in and validated orders out
//! - A key-value store holding the dynamic risk multiplier
//!
//! Both are traits so the service can be started against any backend.
//! Redis implementations connect the service to the rest of the pipeline;
//! in-memory implementations serve standalone runs and tests.

pub mod bus;
pub mod channels;
pub mod error;
pub mod redis_backend;
pub mod store;

pub use bus::{InMemoryBus, MessageBus, Subscription};
pub use channels::{ORDERS_INCOMING, ORDERS_VALIDATED, RISK_MULTIPLIER_KEY};
pub use error::{BusError, BusResult, StoreError, StoreResult};
pub use redis_backend::{RedisBus, RedisStore};
pub use store::{InMemoryStore, ParameterStore};
