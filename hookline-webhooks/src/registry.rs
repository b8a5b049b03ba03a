//! Subscription registry

use crate::{Result, Subscription, SubscriptionRequest};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Insertion-ordered subscription store
#[derive(Debug, Default)]
struct Subscriptions {
    order: Vec<String>,
    by_id: HashMap<String, Subscription>,
}

impl Subscriptions {
    fn ordered(&self) -> impl Iterator<Item = &Subscription> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

/// Registry for managing webhook subscriptions
///
/// Cloning the registry shares the underlying store. Every read takes the
/// lock once and returns owned clones, so callers always see a consistent
/// snapshot even while another task adds or removes subscriptions.
#[derive(Debug, Clone, Default)]
pub struct WebhookRegistry {
    inner: Arc<RwLock<Subscriptions>>,
}

impl WebhookRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription to `event_types` at `endpoint_url`
    ///
    /// Fails with [`crate::WebhookError::InvalidSubscription`] on a malformed
    /// URL or an empty event-type list; the registry is left unchanged.
    pub fn add<I, S>(&self, endpoint_url: &str, event_types: I, secret: Option<&str>) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(
            SubscriptionRequest::new(endpoint_url)
                .events(event_types)
                .maybe_secret(secret),
        )
    }

    /// Register a subscription built with [`SubscriptionRequest`]
    pub fn register(&self, request: SubscriptionRequest) -> Result<String> {
        let subscription = request.into_subscription()?;
        let id = subscription.id.clone();

        info!(
            subscription_id = %id,
            endpoint = %subscription.endpoint_url,
            events = subscription.event_types.len(),
            "webhook subscription added"
        );

        let mut inner = self.inner.write();
        inner.order.push(id.clone());
        inner.by_id.insert(id.clone(), subscription);
        Ok(id)
    }

    /// Remove a subscription; returns whether anything was removed
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.by_id.remove(id).is_none() {
            return false;
        }
        inner.order.retain(|existing| existing != id);
        debug!(subscription_id = %id, "webhook subscription removed");
        true
    }

    /// Get a subscription by ID
    pub fn get(&self, id: &str) -> Option<Subscription> {
        self.inner.read().by_id.get(id).cloned()
    }

    /// All subscriptions in insertion order
    pub fn list(&self) -> Vec<Subscription> {
        self.inner.read().ordered().cloned().collect()
    }

    /// Subscriptions whose event types contain `event_type`, in insertion order
    pub fn matching(&self, event_type: &str) -> Vec<Subscription> {
        self.inner
            .read()
            .ordered()
            .filter(|s| s.is_subscribed_to(event_type))
            .cloned()
            .collect()
    }

    /// Number of registered subscriptions
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    /// Check if a subscription exists
    pub fn exists(&self, id: &str) -> bool {
        self.inner.read().by_id.contains_key(id)
    }

    /// Remove every subscription
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.order.clear();
        inner.by_id.clear();
    }
}
