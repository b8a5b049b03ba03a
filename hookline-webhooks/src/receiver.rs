//! Subscriber-side verification of incoming webhooks

use crate::signature::headers;
use crate::{Result, WebhookEnvelope, WebhookError, WebhookSignature};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Verifies and parses webhooks delivered by a hookline producer
#[derive(Debug, Clone)]
pub struct WebhookReceiver {
    signature: WebhookSignature,
}

impl WebhookReceiver {
    /// Create a receiver holding the subscription secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            signature: WebhookSignature::new(secret),
        }
    }

    /// Check a signature against the raw body
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        self.signature.verify(payload, signature)
    }

    /// Check the `X-Webhook-Signature` header (matched case-insensitively)
    pub fn verify_from_headers(&self, payload: &[u8], headers: &HashMap<String, String>) -> Result<bool> {
        let signature = find_header(headers, headers::SIGNATURE).ok_or(WebhookError::SignatureMissing)?;
        Ok(self.verify(payload, signature))
    }

    /// Verify and parse an incoming webhook
    pub fn receive(&self, payload: &[u8], signature: &str) -> Result<WebhookEnvelope> {
        if !self.verify(payload, signature) {
            warn!(bytes = payload.len(), "rejecting webhook with invalid signature");
            return Err(WebhookError::SignatureInvalid);
        }
        parse(payload)
    }

    /// Verify the signature header and parse the body
    pub fn receive_from_request(
        &self,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<WebhookEnvelope> {
        if !self.verify_from_headers(payload, headers)? {
            warn!(bytes = payload.len(), "rejecting webhook with invalid signature");
            return Err(WebhookError::SignatureInvalid);
        }
        parse(payload)
    }

    /// Create a handler invoked only for `event_filter` (or `"*"` for every event)
    pub fn handler<F>(&self, event_filter: &str, callback: F) -> WebhookHandler<F>
    where
        F: Fn(WebhookEnvelope) -> Result<()>,
    {
        WebhookHandler {
            receiver: self.clone(),
            event_filter: event_filter.to_string(),
            callback,
        }
    }
}

fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn parse(payload: &[u8]) -> Result<WebhookEnvelope> {
    let envelope: WebhookEnvelope = serde_json::from_slice(payload)?;
    debug!(event = %envelope.event, "webhook verified");
    Ok(envelope)
}

/// Verifies, filters and dispatches incoming webhooks to a callback
pub struct WebhookHandler<F>
where
    F: Fn(WebhookEnvelope) -> Result<()>,
{
    receiver: WebhookReceiver,
    event_filter: String,
    callback: F,
}

impl<F> WebhookHandler<F>
where
    F: Fn(WebhookEnvelope) -> Result<()>,
{
    /// Handle a request; returns `Ok(false)` when the event was filtered out
    pub fn handle(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let envelope = self.receiver.receive(payload, signature)?;

        if !self.matches_event(&envelope.event) {
            return Ok(false);
        }

        (self.callback)(envelope)?;
        Ok(true)
    }

    fn matches_event(&self, event: &str) -> bool {
        self.event_filter == "*" || self.event_filter == event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Event;
    use serde_json::json;
    use std::cell::Cell;

    fn signed_body(secret: &str) -> (Vec<u8>, String) {
        let event = Event::new("user_signup", json!({"user_id": "u1"})).unwrap();
        let body = event.to_wire_bytes().unwrap();
        let signature = WebhookSignature::new(secret).sign(&body);
        (body, signature)
    }

    #[test]
    fn test_verify() {
        let receiver = WebhookReceiver::new("s3cr3t");
        let (body, signature) = signed_body("s3cr3t");

        assert!(receiver.verify(&body, &signature));
        assert!(!receiver.verify(&body, "deadbeef"));
        assert!(!receiver.verify(b"other", &signature));
    }

    #[test]
    fn test_receive_parses_envelope() {
        let receiver = WebhookReceiver::new("s3cr3t");
        let (body, signature) = signed_body("s3cr3t");

        let envelope = receiver.receive(&body, &signature).unwrap();
        assert_eq!(envelope.event, "user_signup");
        assert_eq!(envelope.payload["user_id"], "u1");
    }

    #[test]
    fn test_receive_wrong_secret() {
        let receiver = WebhookReceiver::new("other");
        let (body, signature) = signed_body("s3cr3t");

        assert!(matches!(
            receiver.receive(&body, &signature),
            Err(WebhookError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_receive_signed_garbage() {
        let receiver = WebhookReceiver::new("s3cr3t");
        let body = b"not json";
        let signature = WebhookSignature::new("s3cr3t").sign(body);

        assert!(matches!(
            receiver.receive(body, &signature),
            Err(WebhookError::Payload(_))
        ));
    }

    #[test]
    fn test_headers_case_insensitive() {
        let receiver = WebhookReceiver::new("s3cr3t");
        let (body, signature) = signed_body("s3cr3t");

        let mut headers = HashMap::new();
        headers.insert("x-webhook-signature".to_string(), signature);

        assert!(receiver.verify_from_headers(&body, &headers).unwrap());
        assert!(receiver.receive_from_request(&body, &headers).is_ok());
    }

    #[test]
    fn test_missing_signature_header() {
        let receiver = WebhookReceiver::new("s3cr3t");
        let headers = HashMap::new();

        assert!(matches!(
            receiver.verify_from_headers(b"{}", &headers),
            Err(WebhookError::SignatureMissing)
        ));
    }

    #[test]
    fn test_handler_filters_events() {
        let receiver = WebhookReceiver::new("s3cr3t");
        let (body, signature) = signed_body("s3cr3t");
        let calls = Cell::new(0);

        let matching = receiver.handler("user_signup", |_| {
            calls.set(calls.get() + 1);
            Ok(())
        });
        assert!(matching.handle(&body, &signature).unwrap());

        let other = receiver.handler("payment_success", |_| {
            calls.set(calls.get() + 1);
            Ok(())
        });
        assert!(!other.handle(&body, &signature).unwrap());

        let all = receiver.handler("*", |_| {
            calls.set(calls.get() + 1);
            Ok(())
        });
        assert!(all.handle(&body, &signature).unwrap());

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_handler_no_prefix_wildcards() {
        let receiver = WebhookReceiver::new("s3cr3t");
        let handler = receiver.handler("user.*", |_| Ok(()));

        assert!(!handler.matches_event("user.created"));
        assert!(handler.matches_event("user.*"));
    }
}
