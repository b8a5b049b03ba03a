//! Producer-facing facade over the registry and the delivery engine

use crate::{
    DeliveryEngine, DeliveryHandle, DeliveryResult, DeliverySink, Event, Result, Subscription,
    SubscriptionRequest, WebhookConfig, WebhookRegistry,
};
use std::sync::Arc;
use tracing::debug;

/// Registers subscriptions and triggers events
///
/// ```rust,no_run
/// use hookline_webhooks::{WebhookConfig, WebhookManager};
///
/// # async fn run() -> hookline_webhooks::Result<()> {
/// let manager = WebhookManager::new(WebhookConfig::default())?;
/// manager.add_webhook("https://example.com/hooks", ["user_signup"], Some("secret"))?;
///
/// let result = manager
///     .trigger("user_signup", serde_json::json!({"user_id": "u1"}))
///     .await?;
/// println!("{}/{} delivered", result.succeeded, result.total);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebhookManager {
    registry: WebhookRegistry,
    engine: DeliveryEngine,
}

impl WebhookManager {
    /// Create a manager with an empty registry
    pub fn new(config: WebhookConfig) -> Result<Self> {
        Ok(Self {
            registry: WebhookRegistry::new(),
            engine: DeliveryEngine::new(&config)?,
        })
    }

    /// Create a manager over an existing (possibly shared) registry
    pub fn with_registry(config: WebhookConfig, registry: WebhookRegistry) -> Result<Self> {
        Ok(Self {
            registry,
            engine: DeliveryEngine::new(&config)?,
        })
    }

    /// Create a manager reporting every attempt to `sink`
    pub fn with_sink(config: WebhookConfig, sink: Arc<dyn DeliverySink>) -> Result<Self> {
        Ok(Self {
            registry: WebhookRegistry::new(),
            engine: DeliveryEngine::with_sink(&config, sink)?,
        })
    }

    pub fn registry(&self) -> &WebhookRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &DeliveryEngine {
        &self.engine
    }

    /// Subscribe `endpoint_url` to `event_types`
    pub fn add_webhook<I, S>(&self, endpoint_url: &str, event_types: I, secret: Option<&str>) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.add(endpoint_url, event_types, secret)
    }

    /// Subscribe with custom headers or a description
    pub fn register_webhook(&self, request: SubscriptionRequest) -> Result<String> {
        self.registry.register(request)
    }

    pub fn remove_webhook(&self, id: &str) -> bool {
        self.registry.remove(id)
    }

    pub fn get_webhook(&self, id: &str) -> Option<Subscription> {
        self.registry.get(id)
    }

    pub fn list_webhooks(&self) -> Vec<Subscription> {
        self.registry.list()
    }

    /// Build an event and deliver it to every matching subscription.
    ///
    /// Resolves once every matched subscription has succeeded or failed
    /// terminally. Subscriber failures are reported in the result; only
    /// malformed input is an `Err`.
    pub async fn trigger(&self, event_type: &str, payload: serde_json::Value) -> Result<DeliveryResult> {
        let event = Event::new(event_type, payload)?;
        self.trigger_event(event).await
    }

    /// Deliver a prebuilt event (e.g. from [`crate::EventFactory`]) and wait
    pub async fn trigger_event(&self, event: Event) -> Result<DeliveryResult> {
        Ok(self.dispatch(event)?.wait().await)
    }

    /// Start delivering `event` without waiting
    ///
    /// Matches are resolved against the registry now; subscriptions added
    /// or removed afterwards do not affect this dispatch.
    pub fn dispatch(&self, event: Event) -> Result<DeliveryHandle> {
        let subscriptions = self.registry.matching(event.event_type());
        debug!(
            event_id = %event.id(),
            event_type = %event.event_type(),
            matched = subscriptions.len(),
            "resolved webhook subscriptions"
        );
        self.engine.dispatch(&event, subscriptions)
    }

    /// Stop issuing new attempts for every dispatch from this manager
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}
