//! HTTP transport for outgoing webhooks
//!
//! [`WebhookClient`] performs exactly one POST per call. Retry, backoff and
//! fan-out belong to [`crate::DeliveryEngine`].

use crate::signature::headers;
use crate::{DeliveryError, Event, Result, Subscription, WebhookConfig, WebhookError, WebhookSignature};
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::debug;

/// Maximum number of response body bytes kept on a rejected delivery
const MAX_ERROR_BODY: usize = 1024;

/// A fully prepared request for one subscription
///
/// The body and signature are computed once and reused across retries, so
/// every attempt sends byte-identical content.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl DeliveryRequest {
    /// Prepare the request delivering `event` (already serialized to `body`)
    /// to `subscription`
    pub fn new(subscription: &Subscription, event: &Event, body: Bytes) -> Result<Self> {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        insert_header(&mut map, headers::WEBHOOK_ID, event.id())?;
        insert_header(&mut map, headers::EVENT_TYPE, event.event_type())?;

        for (key, value) in &subscription.headers {
            insert_header(&mut map, key, value)?;
        }

        if let Some(secret) = &subscription.secret {
            let signature = WebhookSignature::new(secret.as_str()).sign(&body);
            insert_header(&mut map, headers::SIGNATURE, &signature)?;
        }

        Ok(Self {
            url: subscription.endpoint_url.clone(),
            headers: map,
            body,
        })
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Signature header value, when the subscription is signed
    pub fn signature(&self) -> Option<&str> {
        self.headers
            .get(headers::SIGNATURE)
            .and_then(|v| v.to_str().ok())
    }
}

fn insert_header(map: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| WebhookError::InvalidSubscription(format!("header '{}': {}", name, e)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| WebhookError::InvalidEvent(format!("invalid header value '{}': {}", value, e)))?;
    map.insert(name, value);
    Ok(())
}

/// Client for sending single webhook attempts
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http_client: Client,
    timeout: Duration,
}

impl WebhookClient {
    /// Create a client from the delivery configuration
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            // A redirect would turn the POST into a body-less GET
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            http_client,
            timeout: config.timeout,
        })
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one attempt; returns the 2xx status on success
    pub async fn send(
        &self,
        request: &DeliveryRequest,
        attempt: u32,
    ) -> std::result::Result<u16, DeliveryError> {
        debug!(url = %request.url, attempt, "sending webhook attempt");

        let response = self
            .http_client
            .post(&request.url)
            .headers(request.headers.clone())
            .header(headers::ATTEMPT, attempt)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        Err(DeliveryError::Rejected {
            status_code: status.as_u16(),
            body: read_error_body(response).await,
        })
    }

    fn classify(&self, err: reqwest::Error) -> DeliveryError {
        if err.is_timeout() {
            DeliveryError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if err.is_connect() {
            DeliveryError::Network(format!("connection failed: {}", err))
        } else {
            DeliveryError::Network(err.to_string())
        }
    }
}

/// Read at most `MAX_ERROR_BODY` bytes of a rejected response
async fn read_error_body(mut response: reqwest::Response) -> String {
    let mut buf = Vec::new();
    while buf.len() <= MAX_ERROR_BODY {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    // One byte over the limit is enough for truncation to add its marker
    buf.truncate(MAX_ERROR_BODY + 1);
    truncate_string(&String::from_utf8_lossy(&buf), MAX_ERROR_BODY)
}

/// Truncate a string to at most `max_len` bytes on a char boundary
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
