//! Error types for the transport adapters.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that stop a transport. Per-request problems never show up here;
/// they are answered with a failure envelope instead.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not bind the listen address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The response writer task panicked.
    #[error("response writer failed: {0}")]
    Writer(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
