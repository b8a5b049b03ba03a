//! Webhook delivery engine
//!
//! The engine fans one [`Event`] out to a set of subscriptions. Each
//! subscription gets its own task running a small state machine:
//!
//! ```text
//! Pending ──▶ Sending ──2xx──▶ Success
//!               ▲  │
//!        delay  │  │ non-2xx / network error / timeout
//!               │  ▼
//!            RetryWait ──budget exhausted──▶ TerminalFailure
//! ```
//!
//! Attempts for one subscription are strictly sequential. Tasks share
//! nothing mutable: each owns its prepared request, its attempt counter and
//! its timers, so a slow or failing subscriber cannot delay another.

use crate::{
    DeliveryAttempt, DeliveryError, DeliveryRequest, DeliveryResult, DeliverySink, DeliveryState,
    Event, NoopSink, Result, RetryPolicy, Subscription, SubscriptionOutcome, WebhookClient,
    WebhookConfig, WebhookError,
};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, join_all};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Shared, read-only state handed to every delivery task
struct EngineContext {
    client: WebhookClient,
    retry_policy: RetryPolicy,
    limiter: Option<Arc<Semaphore>>,
    sink: Arc<dyn DeliverySink>,
}

/// Fans events out to subscriptions with retries and failure isolation
#[derive(Clone)]
pub struct DeliveryEngine {
    ctx: Arc<EngineContext>,
    max_payload_size: usize,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine")
            .field("retry_policy", &self.ctx.retry_policy)
            .field("max_payload_size", &self.max_payload_size)
            .field("bounded", &self.ctx.limiter.is_some())
            .finish()
    }
}

impl DeliveryEngine {
    /// Create an engine that discards attempt records
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        Self::with_sink(config, Arc::new(NoopSink))
    }

    /// Create an engine reporting every attempt to `sink`
    pub fn with_sink(config: &WebhookConfig, sink: Arc<dyn DeliverySink>) -> Result<Self> {
        config.validate()?;

        let ctx = EngineContext {
            client: WebhookClient::new(config)?,
            retry_policy: config.retry_policy.clone(),
            limiter: config
                .max_concurrent_deliveries
                .map(|limit| Arc::new(Semaphore::new(limit))),
            sink,
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            max_payload_size: config.max_payload_size,
            shutdown: CancellationToken::new(),
        })
    }

    /// Retry policy applied to every subscription
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.ctx.retry_policy
    }

    /// Start delivering `event` to each of `subscriptions`.
    ///
    /// Returns as soon as every delivery task is spawned. Only input errors
    /// (an oversized payload, a value that cannot be put in a header) fail
    /// here; nothing is sent in that case. Must be called from within a
    /// tokio runtime.
    pub fn dispatch(&self, event: &Event, subscriptions: Vec<Subscription>) -> Result<DeliveryHandle> {
        let body = Bytes::from(event.to_wire_bytes()?);
        if body.len() > self.max_payload_size {
            return Err(WebhookError::PayloadTooLarge {
                size: body.len(),
                max: self.max_payload_size,
            });
        }

        // Prepare everything before spawning so a bad input sends nothing
        let requests = subscriptions
            .iter()
            .map(|sub| DeliveryRequest::new(sub, event, body.clone()))
            .collect::<Result<Vec<_>>>()?;

        let cancel = self.shutdown.child_token();

        info!(
            event_id = %event.id(),
            event_type = %event.event_type(),
            subscriptions = subscriptions.len(),
            "dispatching webhook event"
        );

        let tasks = subscriptions
            .into_iter()
            .zip(requests)
            .map(|(subscription, request)| {
                let task = SubscriptionDelivery {
                    ctx: self.ctx.clone(),
                    subscription_id: subscription.id.clone(),
                    event_id: event.id().to_string(),
                    request,
                    cancel: cancel.clone(),
                };
                let span = info_span!(
                    "webhook_delivery",
                    event_id = %event.id(),
                    subscription_id = %subscription.id,
                );
                PendingDelivery {
                    subscription_id: subscription.id,
                    endpoint_url: subscription.endpoint_url,
                    join: tokio::spawn(task.run().instrument(span)),
                }
            })
            .collect();

        Ok(DeliveryHandle {
            event_id: event.id().to_string(),
            tasks,
            cancel,
        })
    }

    /// Stop issuing new attempts for every dispatch made by this engine
    /// (and its clones), including future ones.
    pub fn shutdown(&self) {
        info!("webhook delivery engine shutting down");
        self.shutdown.cancel();
    }

    /// Whether [`DeliveryEngine::shutdown`] has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// One subscription's delivery sequence
struct SubscriptionDelivery {
    ctx: Arc<EngineContext>,
    subscription_id: String,
    event_id: String,
    request: DeliveryRequest,
    cancel: CancellationToken,
}

impl SubscriptionDelivery {
    async fn run(self) -> SubscriptionOutcome {
        let policy = &self.ctx.retry_policy;
        let mut state = DeliveryState::Pending;
        let mut attempt = 0u32;
        let mut result: std::result::Result<u16, DeliveryError> = Err(DeliveryError::Cancelled);

        loop {
            match state {
                DeliveryState::Pending | DeliveryState::Sending => {
                    if self.cancel.is_cancelled() {
                        debug!(attempt, "delivery cancelled before next attempt");
                        result = Err(DeliveryError::Cancelled);
                        state = DeliveryState::TerminalFailure;
                        continue;
                    }

                    attempt += 1;
                    let mut record = DeliveryAttempt::start(&self.subscription_id, &self.event_id, attempt);

                    match self.send(attempt).await {
                        Ok(status) => {
                            record.succeed(status);
                            info!(attempt, status, url = %self.request.url, "webhook delivered");
                            result = Ok(status);
                            state = DeliveryState::Success;
                        }
                        Err(DeliveryError::Cancelled) => {
                            // Cancelled while waiting for a permit; nothing was sent
                            attempt -= 1;
                            result = Err(DeliveryError::Cancelled);
                            state = DeliveryState::TerminalFailure;
                            continue;
                        }
                        Err(err) => {
                            let retry = err.is_retryable() && policy.should_retry(attempt);
                            record.fail(&err, retry);
                            if retry {
                                warn!(attempt, error = %err, "webhook attempt failed, will retry");
                                state = DeliveryState::RetryWait;
                            } else {
                                error!(attempt, error = %err, url = %self.request.url, "webhook delivery failed permanently");
                                state = DeliveryState::TerminalFailure;
                            }
                            result = Err(err);
                        }
                    }

                    self.ctx.sink.record(&record).await;
                }
                DeliveryState::RetryWait => {
                    let delay = policy.delay_for_attempt(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "waiting before retry");

                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            debug!(attempt, "delivery cancelled during backoff");
                            result = Err(DeliveryError::Cancelled);
                            state = DeliveryState::TerminalFailure;
                        }
                        _ = tokio::time::sleep(delay) => {
                            state = DeliveryState::Sending;
                        }
                    }
                }
                DeliveryState::Success | DeliveryState::TerminalFailure => break,
            }
        }

        SubscriptionOutcome {
            subscription_id: self.subscription_id,
            endpoint_url: self.request.url,
            attempts: attempt,
            result,
        }
    }

    /// One HTTP attempt, holding a concurrency permit only while it is in flight
    async fn send(&self, attempt: u32) -> std::result::Result<u16, DeliveryError> {
        let _permit = match &self.ctx.limiter {
            Some(limiter) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(DeliveryError::Cancelled),
                    permit = limiter.clone().acquire_owned() => Some(
                        permit.map_err(|_| DeliveryError::Aborted("delivery limiter closed".into()))?,
                    ),
                }
            }
            None => None,
        };

        self.ctx.client.send(&self.request, attempt).await
    }
}

/// A spawned delivery task and the subscription it serves
struct PendingDelivery {
    subscription_id: String,
    endpoint_url: String,
    join: JoinHandle<SubscriptionOutcome>,
}

/// Handle to an in-progress dispatch
///
/// Resolves (via [`DeliveryHandle::wait`] or `.await`) once every
/// subscription has reached a terminal state. Dropping the handle does not
/// stop delivery; call [`DeliveryHandle::cancel`] for that.
pub struct DeliveryHandle {
    event_id: String,
    tasks: Vec<PendingDelivery>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DeliveryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryHandle")
            .field("event_id", &self.event_id)
            .field("subscriptions", &self.tasks.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl DeliveryHandle {
    /// Id of the event being delivered
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Number of subscriptions being delivered to
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the event matched no subscriptions
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop issuing new attempts. Attempts already in flight run to
    /// completion or their own timeout.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this dispatch when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether every delivery task has finished
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.join.is_finished())
    }

    /// Wait for every subscription to reach a terminal state
    pub async fn wait(self) -> DeliveryResult {
        let (meta, joins): (Vec<_>, Vec<_>) = self
            .tasks
            .into_iter()
            .map(|t| ((t.subscription_id, t.endpoint_url), t.join))
            .unzip();

        let outcomes = join_all(joins)
            .await
            .into_iter()
            .zip(meta)
            .map(|(joined, (subscription_id, endpoint_url))| match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(subscription_id = %subscription_id, error = %err, "webhook delivery task aborted");
                    SubscriptionOutcome {
                        subscription_id,
                        endpoint_url,
                        attempts: 0,
                        result: Err(DeliveryError::Aborted(err.to_string())),
                    }
                }
            })
            .collect();

        let result = DeliveryResult::from_outcomes(self.event_id, outcomes);
        info!(
            event_id = %result.event_id,
            total = result.total,
            succeeded = result.succeeded,
            failed = result.failed.len(),
            "webhook event delivery finished"
        );
        result
    }
}

impl IntoFuture for DeliveryHandle {
    type Output = DeliveryResult;
    type IntoFuture = BoxFuture<'static, DeliveryResult>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySink, SubscriptionRequest};
    use serde_json::json;
    use std::time::Duration;

    fn subscription(url: &str) -> Subscription {
        SubscriptionRequest::new(url)
            .event("a")
            .into_subscription()
            .unwrap()
    }

    fn fast_config(attempts: u32) -> WebhookConfig {
        WebhookConfig::builder()
            .timeout_ms(500)
            .retry_policy(RetryPolicy::fixed(attempts, Duration::from_millis(10)))
            .build()
    }

    #[tokio::test]
    async fn test_empty_dispatch() {
        let engine = DeliveryEngine::new(&fast_config(3)).unwrap();
        let event = Event::new("a", json!({})).unwrap();

        let handle = engine.dispatch(&event, Vec::new()).unwrap();
        assert!(handle.is_empty());
        assert!(handle.is_finished());

        let result = handle.await;
        assert_eq!(result.total, 0);
        assert_eq!(result.succeeded, 0);
        assert!(result.failed.is_empty());
        assert_eq!(result.event_id, event.id());
    }

    #[tokio::test]
    async fn test_payload_too_large_sends_nothing() {
        let config = WebhookConfig::builder().max_payload_size(16).build();
        let sink = MemorySink::new();
        let engine = DeliveryEngine::with_sink(&config, Arc::new(sink.clone())).unwrap();
        let event = Event::new("a", json!({"large": "definitely more than sixteen bytes"})).unwrap();

        let result = engine.dispatch(&event, vec![subscription("http://127.0.0.1:9/hook")]);
        assert!(matches!(result, Err(WebhookError::PayloadTooLarge { max: 16, .. })));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_exhausts_retries() {
        let sink = MemorySink::new();
        let engine = DeliveryEngine::with_sink(&fast_config(3), Arc::new(sink.clone())).unwrap();
        let event = Event::new("a", json!({})).unwrap();
        let sub = subscription("http://127.0.0.1:9/hook");
        let sub_id = sub.id.clone();

        let result = engine.dispatch(&event, vec![sub]).unwrap().wait().await;

        assert_eq!(result.total, 1);
        assert_eq!(result.succeeded, 0);
        let failure = result.failure_for(&sub_id).unwrap();
        assert_eq!(failure.attempts, 3);

        let attempts = sink.attempts_for(&sub_id);
        assert_eq!(attempts.len(), 3);
        assert_eq!(
            attempts.iter().map(|a| a.attempt_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(attempts[2].outcome, crate::AttemptOutcome::FailedTerminal);
        assert!(
            attempts[..2]
                .iter()
                .all(|a| a.outcome == crate::AttemptOutcome::FailedRetryable)
        );
    }

    #[tokio::test]
    async fn test_cancel_before_first_attempt() {
        let engine = DeliveryEngine::new(&fast_config(3)).unwrap();
        engine.shutdown();
        assert!(engine.is_shut_down());

        let event = Event::new("a", json!({})).unwrap();
        let handle = engine
            .dispatch(&event, vec![subscription("http://127.0.0.1:9/hook")])
            .unwrap();
        let result = handle.wait().await;

        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].error, DeliveryError::Cancelled);
        assert_eq!(result.failed[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let config = WebhookConfig::builder()
            .timeout_ms(500)
            .retry_policy(RetryPolicy::fixed(10, Duration::from_secs(3600)))
            .build();
        let sink = MemorySink::new();
        let engine = DeliveryEngine::with_sink(&config, Arc::new(sink.clone())).unwrap();
        let event = Event::new("a", json!({})).unwrap();

        let handle = engine
            .dispatch(&event, vec![subscription("http://127.0.0.1:9/hook")])
            .unwrap();

        // Wait for the first attempt to be recorded, then cancel mid-backoff
        while sink.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("cancellation should interrupt the backoff");
        assert_eq!(result.failed[0].error, DeliveryError::Cancelled);
        assert_eq!(result.failed[0].attempts, 1);
        assert_eq!(sink.len(), 1);
    }
}
