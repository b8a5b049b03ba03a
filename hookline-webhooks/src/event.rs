//! Event envelopes and typed event constructors

use crate::{Result, WebhookError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type emitted when a dream is recorded
pub const DREAM_CREATED: &str = "dream_created";
/// Event type emitted when a user registers
pub const USER_SIGNUP: &str = "user_signup";
/// Event type emitted when a payment clears
pub const PAYMENT_SUCCESS: &str = "payment_success";
/// Event type emitted when a dream analysis finishes
pub const ANALYSIS_COMPLETE: &str = "analysis_complete";

/// An immutable event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    payload: serde_json::Value,
    timestamp: i64,
}

impl Event {
    /// Build an event with a fresh id and the current time
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Result<Self> {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(WebhookError::InvalidEvent(
                "event type must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            payload,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Build an event from any serializable payload
    pub fn from_serializable<T: Serialize>(event_type: impl Into<String>, data: &T) -> Result<Self> {
        Self::new(event_type, serde_json::to_value(data)?)
    }

    /// Unique event id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Event type
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Opaque payload
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Creation time in epoch milliseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Serialize the body sent to subscribers.
    ///
    /// The signature is computed over exactly these bytes.
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>> {
        let envelope = WireEnvelope {
            event: &self.event_type,
            payload: &self.payload,
            timestamp: self.timestamp,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }
}

#[derive(Serialize)]
struct WireEnvelope<'a> {
    event: &'a str,
    payload: &'a serde_json::Value,
    timestamp: i64,
}

/// Body of a delivered webhook, as seen by a subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Event type
    pub event: String,

    /// Event payload
    pub payload: serde_json::Value,

    /// Event time in epoch milliseconds
    pub timestamp: i64,
}

/// Fields of a `dream_created` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreamCreated {
    pub dream_id: String,
    pub user_id: String,
    pub title: String,
}

/// Fields of a `user_signup` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSignup {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

/// Fields of a `payment_success` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSuccess {
    pub payment_id: String,
    pub user_id: String,
    pub amount_cents: u64,
    pub currency: String,
}

/// Fields of an `analysis_complete` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisComplete {
    pub analysis_id: String,
    pub dream_id: String,
    pub summary: String,
    #[serde(default)]
    pub themes: Vec<String>,
}

/// Pure constructors for the known event shapes
pub struct EventFactory;

impl EventFactory {
    pub fn dream_created(data: DreamCreated) -> Result<Event> {
        require("dream_id", &data.dream_id)?;
        require("user_id", &data.user_id)?;
        require("title", &data.title)?;
        Event::from_serializable(DREAM_CREATED, &data)
    }

    pub fn user_signup(data: UserSignup) -> Result<Event> {
        require("user_id", &data.user_id)?;
        require("email", &data.email)?;
        if !data.email.contains('@') {
            return Err(WebhookError::InvalidEvent(format!(
                "email '{}' is not an address",
                data.email
            )));
        }
        Event::from_serializable(USER_SIGNUP, &data)
    }

    pub fn payment_success(data: PaymentSuccess) -> Result<Event> {
        require("payment_id", &data.payment_id)?;
        require("user_id", &data.user_id)?;
        if data.amount_cents == 0 {
            return Err(WebhookError::InvalidEvent(
                "amount_cents must be positive".to_string(),
            ));
        }
        if data.currency.len() != 3 || !data.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(WebhookError::InvalidEvent(format!(
                "currency '{}' is not a 3-letter code",
                data.currency
            )));
        }
        Event::from_serializable(PAYMENT_SUCCESS, &data)
    }

    pub fn analysis_complete(data: AnalysisComplete) -> Result<Event> {
        require("analysis_id", &data.analysis_id)?;
        require("dream_id", &data.dream_id)?;
        require("summary", &data.summary)?;
        Event::from_serializable(ANALYSIS_COMPLETE, &data)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WebhookError::InvalidEvent(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_creation() {
        let event = Event::new("user.created", json!({"user_id": "123"})).unwrap();

        assert_eq!(event.event_type(), "user.created");
        assert!(!event.id().is_empty());
        assert!(event.timestamp() > 0);
    }

    #[test]
    fn test_unique_ids() {
        let a = Event::new("x", json!({})).unwrap();
        let b = Event::new("x", json!({})).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_empty_type_rejected() {
        assert!(matches!(
            Event::new("  ", json!({})),
            Err(WebhookError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_wire_format() {
        let event = Event::new("dream_created", json!({"id": "d1"})).unwrap();
        let body = String::from_utf8(event.to_wire_bytes().unwrap()).unwrap();

        assert_eq!(
            body,
            format!(
                r#"{{"event":"dream_created","payload":{{"id":"d1"}},"timestamp":{}}}"#,
                event.timestamp()
            )
        );

        let parsed: WebhookEnvelope = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.event, "dream_created");
        assert_eq!(parsed.timestamp, event.timestamp());
    }

    #[test]
    fn test_envelope_serializes_type_field() {
        let event = Event::new("a", json!(null)).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "a");
        assert!(value.get("id").is_some());
    }

    #[test]
    fn test_factory_dream_created() {
        let event = EventFactory::dream_created(DreamCreated {
            dream_id: "d1".into(),
            user_id: "u1".into(),
            title: "Flying".into(),
        })
        .unwrap();

        assert_eq!(event.event_type(), DREAM_CREATED);
        assert_eq!(event.payload()["dream_id"], "d1");
    }

    #[test]
    fn test_factory_rejects_empty_fields() {
        let result = EventFactory::dream_created(DreamCreated {
            dream_id: "".into(),
            user_id: "u1".into(),
            title: "t".into(),
        });
        assert!(matches!(result, Err(WebhookError::InvalidEvent(_))));

        let result = EventFactory::analysis_complete(AnalysisComplete {
            analysis_id: "a1".into(),
            dream_id: "d1".into(),
            summary: " ".into(),
            themes: vec![],
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_factory_user_signup() {
        let event = EventFactory::user_signup(UserSignup {
            user_id: "u1".into(),
            email: "alice@example.com".into(),
            plan: None,
        })
        .unwrap();
        assert_eq!(event.event_type(), USER_SIGNUP);
        assert!(event.payload().get("plan").is_none());

        let bad = EventFactory::user_signup(UserSignup {
            user_id: "u1".into(),
            email: "not-an-email".into(),
            plan: None,
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_factory_payment_success() {
        let event = EventFactory::payment_success(PaymentSuccess {
            payment_id: "pay_1".into(),
            user_id: "u1".into(),
            amount_cents: 999,
            currency: "usd".into(),
        })
        .unwrap();
        assert_eq!(event.event_type(), PAYMENT_SUCCESS);
        assert_eq!(event.payload()["amount_cents"], 999);

        let zero = EventFactory::payment_success(PaymentSuccess {
            payment_id: "pay_1".into(),
            user_id: "u1".into(),
            amount_cents: 0,
            currency: "usd".into(),
        });
        assert!(zero.is_err());

        let bad_currency = EventFactory::payment_success(PaymentSuccess {
            payment_id: "pay_1".into(),
            user_id: "u1".into(),
            amount_cents: 10,
            currency: "dollars".into(),
        });
        assert!(bad_currency.is_err());
    }
}
