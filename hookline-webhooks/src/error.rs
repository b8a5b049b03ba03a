//! Error types for webhook operations

use thiserror::Error;

/// Errors surfaced synchronously to producers and callers.
///
/// Environmental delivery failures are never reported through this type;
/// they end up as [`DeliveryError`] entries in a [`crate::DeliveryResult`].
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Malformed URL or empty event-type set on registration
    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    /// Malformed event input (e.g. empty event type or required field)
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Serialized event exceeds the configured size limit
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Payload serialization/deserialization failed
    #[error("Payload error: {0}")]
    Payload(String),

    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Signature missing from request
    #[error("Signature missing from request")]
    SignatureMissing,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::Payload(err.to_string())
    }
}

impl From<url::ParseError> for WebhookError {
    fn from(err: url::ParseError) -> Self {
        WebhookError::InvalidSubscription(format!("invalid endpoint URL: {err}"))
    }
}

/// Outcome of a single failed delivery attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The attempt exceeded its timeout
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection refused, DNS failure and the like
    #[error("network error: {0}")]
    Network(String),

    /// The subscriber answered with a non-2xx status
    #[error("subscriber rejected delivery with HTTP {status_code}")]
    Rejected { status_code: u16, body: String },

    /// Delivery was cancelled before it could succeed
    #[error("delivery cancelled")]
    Cancelled,

    /// The delivery task stopped without reporting an outcome
    #[error("delivery task aborted: {0}")]
    Aborted(String),
}

impl DeliveryError {
    /// Whether another attempt may be made after this failure
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Aborted(_))
    }

    /// HTTP status carried by the failure, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}
