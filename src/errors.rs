//! State Bus Error Hierarchy
//!
//! Defines the error types surfaced by the row store adapter, the state
//! transports and the event multiplexer.
//!
//! "Nothing pending" and "select timed out" are normal negative results and
//! are therefore not errors: `pop()` returns `Ok(None)` and `select()` returns
//! [`crate::SelectOutcome::Timeout`].

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Row store failures (connectivity, type mismatch, undecodable data)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Event multiplexer misuse
    #[error(transparent)]
    Select(#[from] SelectError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// True when the store could not be reached. The caller owns the
    /// reconnect policy; nothing in this crate retries.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Store(StoreError::Connection(_)))
    }

    /// True when a stored row, queue entry or event could not be decoded.
    pub fn is_malformed_entry(&self) -> bool {
        matches!(self, Error::Store(StoreError::MalformedEntry { .. }))
    }

    /// True when a subscription lost messages to a full buffer.
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self, Error::Store(StoreError::SubscriberOverflow { .. }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store unreachable or connection closed
    #[error("Store connection error: {0}")]
    Connection(String),

    /// A stored row, queued entry or event payload could not be parsed
    #[error("Malformed entry at {location}: {reason}")]
    MalformedEntry { location: String, reason: String },

    /// Operation against a key holding a different value type
    #[error("WRONGTYPE operation against key {key} holding {actual}, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Subscription id no longer registered with the store
    #[error("Unknown subscription {0}")]
    UnknownSubscription(u64),

    /// Client id no longer registered with the store
    #[error("Unknown client {0}")]
    UnknownClient(u64),

    /// Subscriber buffer was full and `dropped` messages were discarded since
    /// the subscriber last looked. Whatever those messages described is lost
    /// for this subscriber; the caller has to resynchronize.
    #[error("Subscription {id} overflowed, {dropped} messages dropped")]
    SubscriberOverflow { id: u64, dropped: u64 },
}

impl StoreError {
    pub(crate) fn malformed(
        location: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        StoreError::MalformedEntry {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    /// `select` asked to wait forever with no registered selectables
    #[error("No selectable registered, nothing could ever become ready")]
    NothingRegistered,
}
