//! Delivery attempt records, aggregate results and attempt sinks

use crate::DeliveryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// States of a single subscription's delivery
///
/// ```text
/// Pending -> Sending -> Success
///               |  ^
///               v  |
///            RetryWait -> TerminalFailure
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Not yet attempted
    Pending,
    /// An HTTP attempt is in flight
    Sending,
    /// Waiting out the backoff delay before the next attempt
    RetryWait,
    /// Delivered with a 2xx response
    Success,
    /// Retry budget exhausted or cancelled
    TerminalFailure,
}

impl DeliveryState {
    /// Check if the delivery is complete (success or terminal failure)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::TerminalFailure)
    }
}

/// Outcome of one HTTP attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Pending,
    Success,
    FailedRetryable,
    FailedTerminal,
}

/// Record of a single HTTP delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub subscription_id: String,
    pub event_id: String,
    /// 1-based attempt number
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
    pub http_status: Option<u16>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeliveryAttempt {
    /// Start a new attempt record
    pub fn start(subscription_id: &str, event_id: &str, attempt_number: u32) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            event_id: event_id.to_string(),
            attempt_number,
            outcome: AttemptOutcome::Pending,
            http_status: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record a 2xx response
    pub fn succeed(&mut self, status_code: u16) {
        self.outcome = AttemptOutcome::Success;
        self.http_status = Some(status_code);
        self.error = None;
        self.finished_at = Some(Utc::now());
    }

    /// Record a failure; `retryable` says whether another attempt follows
    pub fn fail(&mut self, error: &DeliveryError, retryable: bool) {
        self.outcome = if retryable {
            AttemptOutcome::FailedRetryable
        } else {
            AttemptOutcome::FailedTerminal
        };
        self.http_status = error.status_code();
        self.error = Some(error.to_string());
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration of the attempt, once finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

/// A subscription whose delivery ended in terminal failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    pub subscription_id: String,
    pub endpoint_url: String,
    /// HTTP attempts actually made
    pub attempts: u32,
    /// Error of the last attempt
    pub error: DeliveryError,
}

/// Terminal outcome of one subscription's delivery sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    pub subscription_id: String,
    pub endpoint_url: String,
    pub attempts: u32,
    pub result: std::result::Result<u16, DeliveryError>,
}

impl SubscriptionOutcome {
    /// Whether the subscription received the event
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Final state of the delivery state machine
    pub fn state(&self) -> DeliveryState {
        if self.is_success() {
            DeliveryState::Success
        } else {
            DeliveryState::TerminalFailure
        }
    }
}

/// Aggregate result of triggering one event
///
/// Every subscription that matched at trigger time appears exactly once,
/// either in `succeeded` or in `failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryResult {
    pub event_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedDelivery>,
    pub outcomes: Vec<SubscriptionOutcome>,
}

impl DeliveryResult {
    /// Aggregate a set of terminal outcomes
    pub fn from_outcomes(event_id: impl Into<String>, outcomes: Vec<SubscriptionOutcome>) -> Self {
        let failed: Vec<FailedDelivery> = outcomes
            .iter()
            .filter_map(|o| match &o.result {
                Ok(_) => None,
                Err(error) => Some(FailedDelivery {
                    subscription_id: o.subscription_id.clone(),
                    endpoint_url: o.endpoint_url.clone(),
                    attempts: o.attempts,
                    error: error.clone(),
                }),
            })
            .collect();

        Self {
            event_id: event_id.into(),
            total: outcomes.len(),
            succeeded: outcomes.len() - failed.len(),
            failed,
            outcomes,
        }
    }

    /// Whether every matched subscription received the event
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// The failure entry for a subscription, if it failed
    pub fn failure_for(&self, subscription_id: &str) -> Option<&FailedDelivery> {
        self.failed.iter().find(|f| f.subscription_id == subscription_id)
    }
}

/// Destination for attempt records
///
/// The engine calls [`DeliverySink::record`] once per finished attempt.
/// Implementations must not block; persistence, metrics or auditing live
/// behind this trait.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn record(&self, attempt: &DeliveryAttempt);
}

/// Sink that discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl DeliverySink for NoopSink {
    async fn record(&self, _attempt: &DeliveryAttempt) {}
}

/// Sink that keeps every record in memory, in arrival order
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    attempts: Arc<Mutex<Vec<DeliveryAttempt>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded attempts
    pub fn attempts(&self) -> Vec<DeliveryAttempt> {
        self.attempts.lock().clone()
    }

    /// Attempts recorded for one subscription
    pub fn attempts_for(&self, subscription_id: &str) -> Vec<DeliveryAttempt> {
        self.attempts
            .lock()
            .iter()
            .filter(|a| a.subscription_id == subscription_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.lock().is_empty()
    }
}

#[async_trait]
impl DeliverySink for MemorySink {
    async fn record(&self, attempt: &DeliveryAttempt) {
        self.attempts.lock().push(attempt.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, result: std::result::Result<u16, DeliveryError>) -> SubscriptionOutcome {
        SubscriptionOutcome {
            subscription_id: id.to_string(),
            endpoint_url: format!("https://example.com/{}", id),
            attempts: 1,
            result,
        }
    }

    #[test]
    fn test_state_terminality() {
        assert!(DeliveryState::Success.is_terminal());
        assert!(DeliveryState::TerminalFailure.is_terminal());
        assert!(!DeliveryState::RetryWait.is_terminal());
        assert!(!DeliveryState::Sending.is_terminal());
        assert!(!DeliveryState::Pending.is_terminal());
    }

    #[test]
    fn test_attempt_lifecycle() {
        let mut attempt = DeliveryAttempt::start("sub", "evt", 1);
        assert_eq!(attempt.outcome, AttemptOutcome::Pending);
        assert!(attempt.duration().is_none());

        attempt.fail(
            &DeliveryError::Rejected {
                status_code: 503,
                body: String::new(),
            },
            true,
        );
        assert_eq!(attempt.outcome, AttemptOutcome::FailedRetryable);
        assert_eq!(attempt.http_status, Some(503));
        assert!(attempt.error.is_some());
        assert!(attempt.duration().is_some());

        let mut second = DeliveryAttempt::start("sub", "evt", 2);
        second.succeed(200);
        assert_eq!(second.outcome, AttemptOutcome::Success);
        assert_eq!(second.http_status, Some(200));
    }

    #[test]
    fn test_terminal_failure_record() {
        let mut attempt = DeliveryAttempt::start("sub", "evt", 3);
        attempt.fail(&DeliveryError::Network("refused".into()), false);
        assert_eq!(attempt.outcome, AttemptOutcome::FailedTerminal);
        assert_eq!(attempt.http_status, None);
    }

    #[test]
    fn test_result_aggregation() {
        let result = DeliveryResult::from_outcomes(
            "evt",
            vec![
                outcome("a", Ok(200)),
                outcome("b", Err(DeliveryError::Timeout { timeout_ms: 10 })),
                outcome("c", Ok(204)),
            ],
        );

        assert_eq!(result.total, 3);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].subscription_id, "b");
        assert!(result.failure_for("b").is_some());
        assert!(result.failure_for("a").is_none());
        assert!(!result.all_succeeded());
        assert_eq!(result.outcomes[1].state(), DeliveryState::TerminalFailure);
    }

    #[test]
    fn test_empty_result() {
        let result = DeliveryResult::from_outcomes("evt", Vec::new());
        assert_eq!(result.total, 0);
        assert_eq!(result.succeeded, 0);
        assert!(result.failed.is_empty());
        assert!(result.all_succeeded());
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.record(&DeliveryAttempt::start("a", "e", 1)).await;
        sink.record(&DeliveryAttempt::start("b", "e", 1)).await;
        sink.record(&DeliveryAttempt::start("a", "e", 2)).await;

        assert_eq!(sink.len(), 3);
        let for_a = sink.attempts_for("a");
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[1].attempt_number, 2);
    }
}
