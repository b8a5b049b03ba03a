//! Error types for the hookline CLI.

use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// IO error (reading a body, writing output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Webhook(#[from] hookline_webhooks::WebhookError),

    #[error("Test server error: {0}")]
    Server(#[from] hookline_testing::TestServerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
