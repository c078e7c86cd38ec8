//! Error types for the poolscan pipeline.

use thiserror::Error;

/// Errors that can occur while scanning for events.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Transport or timeout failure reaching the node.
    #[error("Network error: {0}")]
    Network(String),

    /// The node rejected or failed a well-formed query.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The push feed reported a broken subscription.
    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Cursor cannot move backwards from block {current} to {requested}")]
    CursorRegression { current: u64, requested: u64 },

    #[error("Event sink failed: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl ScanError {
    /// Shorthand for an RPC error that carries no node error code.
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc {
            code: 0,
            message: message.into(),
        }
    }

    /// Returns `true` if the error is absorbed by the retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Rpc { .. })
    }

    /// Returns `true` if the error ended a subscription handle.
    pub fn is_subscription(&self) -> bool {
        matches!(self, Self::Subscription(_))
    }
}

/// Errors raised while decoding a single log into a `PoolCreatedEvent`.
///
/// A decode error never aborts a batch: the offending log is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected at least {expected} topics, got {got}")]
    TooFewTopics { expected: usize, got: usize },

    #[error("expected at least {expected} bytes of data, got {got}")]
    DataTooShort { expected: usize, got: usize },

    #[error("field '{field}' out of range for {ty}")]
    OutOfRange { field: &'static str, ty: &'static str },
}
