//! Test server errors

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestServerError {
    /// The listening socket could not be bound
    #[error("Failed to bind test server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A recorded body could not be decoded
    #[error("Invalid request body: {0}")]
    Body(#[from] serde_json::Error),
}

/// Result type for test server operations
pub type Result<T> = std::result::Result<T, TestServerError>;
