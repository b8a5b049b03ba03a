//! Webhook signature generation and verification
//!
//! Signatures are lowercase hex HMAC-SHA256 digests over the raw request
//! body, carried in the [`headers::SIGNATURE`] header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Webhook signature utilities bound to one secret
#[derive(Clone)]
pub struct WebhookSignature {
    secret: String,
}

impl std::fmt::Debug for WebhookSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSignature")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl WebhookSignature {
    /// Create a new signature utility with the given secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex HMAC-SHA256 of `payload`
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.mac(payload).finalize().into_bytes())
    }

    /// Check `signature` against `payload` in constant time.
    ///
    /// Malformed signatures (bad hex, wrong length) simply fail.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        self.mac(payload).verify_slice(&expected).is_ok()
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take any size key");
        mac.update(payload);
        mac
    }
}

/// Hex HMAC-SHA256 of `payload` keyed with `secret`
pub fn sign(payload: &[u8], secret: &str) -> String {
    WebhookSignature::new(secret).sign(payload)
}

/// Verify a signature header value for `payload`; never panics
pub fn verify(payload: &[u8], signature: &str, secret: &str) -> bool {
    WebhookSignature::new(secret).verify(payload, signature)
}

/// Header names used on outgoing webhooks
pub mod headers {
    /// Hex HMAC-SHA256 of the raw body
    pub const SIGNATURE: &str = "X-Webhook-Signature";

    /// Event id
    pub const WEBHOOK_ID: &str = "X-Webhook-Id";

    /// Event type
    pub const EVENT_TYPE: &str = "X-Webhook-Event";

    /// 1-based delivery attempt number
    pub const ATTEMPT: &str = "X-Webhook-Attempt";
}
