//! Bus and store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Bus unavailable: {0}")]
    Unavailable(String),

    #[error("Subscribe failed: {channel} - {reason}")]
    SubscribeFailed { channel: String, reason: String },

    #[error("Publish failed: {channel} - {reason}")]
    PublishFailed { channel: String, reason: String },

    #[error("Subscriber lagged on {channel}: {skipped} messages skipped")]
    Lagged { channel: String, skipped: u64 },

    #[error("Channel closed: {0}")]
    Closed(String),
}

pub type BusResult<T> = Result<T, BusError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store read failed: {key} - {reason}")]
    ReadFailed { key: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
