//! Risk state and order validation.
//!
//! - `RiskState`: static limits, running daily loss and the cached dynamic
//!   risk multiplier, shared between the validation path and the refresher
//! - `OrderValidator`: synchronous approve/reject decision that scales order
//!   size by the cached multiplier without any external I/O

pub mod error;
pub mod state;
pub mod validator;

pub use error::{RiskError, RiskResult};
pub use state::{parse_multiplier, MultiplierSnapshot, RiskState, DEFAULT_MULTIPLIER};
pub use validator::{Decision, OrderValidator, RejectReason};
