//! `hookline listen`
//!
//! Runs a recording server and prints each received webhook as one JSON
//! line on stdout until Ctrl-C.
//!
//! ```bash
//! hookline listen --port 8787 --secret s3cr3t
//! hookline listen --port 8787 --status 503   # exercise sender retries
//! ```

use crate::error::CliResult;
use hookline_testing::{ReceivedRequest, TestServer};
use hookline_webhooks::headers;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ListenArgs {
    pub port: u16,
    pub status: u16,
    /// When set, each line reports whether the signature verified
    pub secret: Option<String>,
}

pub async fn run(args: ListenArgs) -> CliResult<()> {
    let server = TestServer::create(args.port).await?;
    server.respond_with(args.status);
    info!(url = %server.url(), status = args.status, "listening for webhooks");

    let mut printed = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            arrived = server.wait_for_requests(printed + 1, Duration::from_secs(1)) => {
                if !arrived {
                    continue;
                }
                for request in server.received().iter().skip(printed) {
                    println!("{}", describe(request, args.secret.as_deref()));
                    printed += 1;
                }
            }
        }
    }

    info!(received = printed, "shutting down");
    server.stop().await;
    Ok(())
}

/// One output line for a received request
pub fn describe(request: &ReceivedRequest, secret: Option<&str>) -> Value {
    let body = serde_json::from_slice::<Value>(&request.body)
        .unwrap_or_else(|_| Value::String(request.body_string()));
    let signature = request.header(headers::SIGNATURE);

    let mut line = json!({
        "received_at": request.received_at.to_rfc3339(),
        "method": request.method,
        "path": request.path,
        "event_id": request.header(headers::WEBHOOK_ID),
        "event_type": request.header(headers::EVENT_TYPE),
        "attempt": request.header(headers::ATTEMPT),
        "signature": signature,
        "body": body,
    });

    if let Some(secret) = secret {
        let verified = signature.is_some_and(|sig| hookline_webhooks::verify(&request.body, sig, secret));
        line["verified"] = Value::Bool(verified);
    }
    line
}
