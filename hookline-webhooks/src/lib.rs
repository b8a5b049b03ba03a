//! At-least-once webhook dispatch
//!
//! Producers register subscriptions (an endpoint, a set of event types and
//! an optional secret) and trigger events. Each matching subscription gets
//! an independent delivery: a signed JSON `POST`, retried with exponential
//! backoff until it succeeds or the retry budget runs out.
//!
//! # Features
//!
//! - **Registry**: insertion-ordered subscriptions with exact event-type matching
//! - **Signing**: hex HMAC-SHA256 over the raw body in `X-Webhook-Signature`
//! - **Retries**: configurable attempt budget, backoff cap and jitter
//! - **Isolation**: one task per subscription; a failing subscriber never delays another
//! - **Cancellation**: stop pending retries through a [`DeliveryHandle`]
//! - **Receiving**: [`WebhookReceiver`] verifies and parses incoming webhooks
//!
//! # Example: Triggering Events
//!
//! ```rust,no_run
//! use hookline_webhooks::{EventFactory, UserSignup, WebhookConfig, WebhookManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = WebhookManager::new(WebhookConfig::from_env()?)?;
//!     manager.add_webhook("https://crm.example.com/hooks", ["user_signup"], Some("secret"))?;
//!
//!     let event = EventFactory::user_signup(UserSignup {
//!         user_id: "u_123".into(),
//!         email: "dreamer@example.com".into(),
//!         plan: None,
//!     })?;
//!
//!     let result = manager.trigger_event(event).await?;
//!     for failure in &result.failed {
//!         eprintln!("{} failed: {}", failure.endpoint_url, failure.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Example: Receiving Webhooks
//!
//! ```rust
//! use hookline_webhooks::WebhookReceiver;
//!
//! let receiver = WebhookReceiver::new("secret");
//! let body = br#"{"event":"user_signup","payload":{},"timestamp":0}"#;
//! let signature = hookline_webhooks::sign(body, "secret");
//!
//! let envelope = receiver.receive(body, &signature).unwrap();
//! assert_eq!(envelope.event, "user_signup");
//! ```

mod client;
mod config;
mod delivery;
mod engine;
mod error;
mod event;
mod manager;
mod receiver;
mod registry;
mod retry;
mod signature;
mod subscription;

pub use client::{DeliveryRequest, WebhookClient};
pub use config::{DEFAULT_ENV_PREFIX, WebhookConfig, WebhookConfigBuilder};
pub use delivery::{
    AttemptOutcome, DeliveryAttempt, DeliveryResult, DeliverySink, DeliveryState, FailedDelivery,
    MemorySink, NoopSink, SubscriptionOutcome,
};
pub use engine::{DeliveryEngine, DeliveryHandle};
pub use error::{DeliveryError, WebhookError};
pub use event::{
    ANALYSIS_COMPLETE, AnalysisComplete, DREAM_CREATED, DreamCreated, Event, EventFactory,
    PAYMENT_SUCCESS, PaymentSuccess, USER_SIGNUP, UserSignup, WebhookEnvelope,
};
pub use manager::WebhookManager;
pub use receiver::{WebhookHandler, WebhookReceiver};
pub use registry::WebhookRegistry;
pub use retry::RetryPolicy;
pub use signature::{WebhookSignature, headers, sign, verify};
pub use subscription::{Subscription, SubscriptionRequest};

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;
