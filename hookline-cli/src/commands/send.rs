//! `hookline send`
//!
//! Registers a single subscription, triggers one event against it and
//! prints the delivery result as JSON.

use crate::error::{CliError, CliResult};
use hookline_webhooks::{DeliveryResult, WebhookConfig, WebhookManager};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SendArgs {
    pub url: String,
    pub event: String,
    /// JSON payload; `{}` when absent
    pub payload: Option<String>,
    pub secret: Option<String>,
    /// TOML config file; environment variables are used otherwise
    pub config: Option<PathBuf>,
    pub max_attempts: Option<u32>,
}

/// Returns whether every delivery succeeded
pub async fn run(args: SendArgs) -> CliResult<bool> {
    let mut config = match &args.config {
        Some(path) => WebhookConfig::from_file(path)?,
        None => WebhookConfig::from_env()?,
    };
    if let Some(attempts) = args.max_attempts {
        if attempts == 0 {
            return Err(CliError::InvalidArgument("--max-attempts must be at least 1".into()));
        }
        config.retry_policy.max_attempts = attempts;
    }
    debug!(?config, "resolved delivery configuration");

    let payload: Value = match &args.payload {
        Some(raw) => serde_json::from_str(raw)?,
        None => json!({}),
    };

    let manager = WebhookManager::new(config)?;
    manager.add_webhook(&args.url, [args.event.as_str()], args.secret.as_deref())?;

    let result = manager.trigger(&args.event, payload).await?;
    println!("{}", serde_json::to_string_pretty(&report(&result))?);
    Ok(result.all_succeeded())
}

/// JSON rendering of a delivery result
pub fn report(result: &DeliveryResult) -> Value {
    let failed: Vec<Value> = result
        .failed
        .iter()
        .map(|f| {
            json!({
                "subscription_id": f.subscription_id,
                "endpoint_url": f.endpoint_url,
                "attempts": f.attempts,
                "status_code": f.error.status_code(),
                "error": f.error.to_string(),
            })
        })
        .collect();

    json!({
        "event_id": result.event_id,
        "total": result.total,
        "succeeded": result.succeeded,
        "failed": failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookline_webhooks::{DeliveryError, SubscriptionOutcome};

    #[test]
    fn test_report_shape() {
        let result = DeliveryResult::from_outcomes(
            "evt_1",
            vec![
                SubscriptionOutcome {
                    subscription_id: "a".into(),
                    endpoint_url: "http://a".into(),
                    attempts: 1,
                    result: Ok(200),
                },
                SubscriptionOutcome {
                    subscription_id: "b".into(),
                    endpoint_url: "http://b".into(),
                    attempts: 3,
                    result: Err(DeliveryError::Rejected {
                        status_code: 500,
                        body: String::new(),
                    }),
                },
            ],
        );

        let report = report(&result);
        assert_eq!(report["event_id"], "evt_1");
        assert_eq!(report["total"], 2);
        assert_eq!(report["succeeded"], 1);
        assert_eq!(report["failed"][0]["subscription_id"], "b");
        assert_eq!(report["failed"][0]["attempts"], 3);
        assert_eq!(report["failed"][0]["status_code"], 500);
    }
}
