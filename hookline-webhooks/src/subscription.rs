//! Subscriptions and the request builder used to register them

use crate::signature::headers;
use crate::{Result, WebhookError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use url::Url;
use uuid::Uuid;

/// A registered webhook subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique subscription ID
    pub id: String,

    /// Target URL for webhook delivery
    pub endpoint_url: String,

    /// Event types this subscription receives
    pub event_types: HashSet<String>,

    /// Signing secret; deliveries are unsigned without one
    #[serde(skip_serializing, default)]
    pub secret: Option<String>,

    /// Extra headers sent with every delivery
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Check if this subscription receives an event type (exact match)
    pub fn is_subscribed_to(&self, event_type: &str) -> bool {
        self.event_types.contains(event_type)
    }

    /// Whether deliveries carry a signature header
    pub fn is_signed(&self) -> bool {
        self.secret.is_some()
    }
}

/// Builder for a new subscription, validated on registration
#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    endpoint_url: String,
    event_types: Vec<String>,
    secret: Option<String>,
    headers: HashMap<String, String>,
    description: Option<String>,
}

impl SubscriptionRequest {
    /// Start a request for the given endpoint
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            event_types: Vec::new(),
            secret: None,
            headers: HashMap::new(),
            description: None,
        }
    }

    /// Subscribe to events
    pub fn events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types.extend(events.into_iter().map(Into::into));
        self
    }

    /// Subscribe to a single event
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event_types.push(event.into());
        self
    }

    /// Set the signing secret
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set the signing secret if present
    pub fn maybe_secret(mut self, secret: Option<impl Into<String>>) -> Self {
        self.secret = secret.map(Into::into);
        self
    }

    /// Add a custom header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate and turn into a subscription with a fresh id
    pub(crate) fn into_subscription(self) -> Result<Subscription> {
        let endpoint_url = validate_endpoint(&self.endpoint_url)?;

        if self.event_types.is_empty() {
            return Err(WebhookError::InvalidSubscription(
                "at least one event type is required".to_string(),
            ));
        }
        if self.event_types.iter().any(|e| e.trim().is_empty()) {
            return Err(WebhookError::InvalidSubscription(
                "event types must not be empty".to_string(),
            ));
        }

        for (name, value) in &self.headers {
            if RESERVED_HEADERS.iter().any(|r| r.eq_ignore_ascii_case(name)) {
                return Err(WebhookError::InvalidSubscription(format!(
                    "header '{}' is set by the delivery engine",
                    name
                )));
            }
            if reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_err()
                || reqwest::header::HeaderValue::from_str(value).is_err()
            {
                return Err(WebhookError::InvalidSubscription(format!(
                    "invalid header '{}'",
                    name
                )));
            }
        }

        Ok(Subscription {
            id: Uuid::new_v4().to_string(),
            endpoint_url,
            event_types: self.event_types.into_iter().collect(),
            secret: self.secret,
            headers: self.headers,
            description: self.description,
            created_at: Utc::now(),
        })
    }
}

/// Headers owned by the delivery engine; subscriptions may not set them
const RESERVED_HEADERS: &[&str] = &[
    "content-type",
    "user-agent",
    headers::SIGNATURE,
    headers::WEBHOOK_ID,
    headers::EVENT_TYPE,
    headers::ATTEMPT,
];

/// Accept only absolute http(s) URLs with a host
fn validate_endpoint(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(WebhookError::InvalidSubscription(format!(
            "unsupported URL scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(WebhookError::InvalidSubscription(format!(
            "endpoint URL '{}' has no host",
            raw
        )));
    }

    Ok(raw.trim().to_string())
}
