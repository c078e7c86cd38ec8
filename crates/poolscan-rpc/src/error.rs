//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, bad status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns `true` if the node could not be reached (as opposed to answering
    /// with an error).
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. }
        )
    }
}
