//! Testing utilities for hookline webhook delivery.
//!
//! [`TestServer`] is a real HTTP server on localhost that records every
//! request it receives, so tests can assert on exactly what a subscriber
//! would see: method, headers, raw body bytes and arrival order.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hookline_testing::TestServer;
//! use std::time::Duration;
//!
//! # async fn run() -> hookline_testing::Result<()> {
//! let server = TestServer::create(0).await?;
//! server.respond_with_sequence([503, 503]);
//!
//! // ... point a subscription at server.url_for("/hook") and trigger ...
//!
//! assert!(server.wait_for_requests(3, Duration::from_secs(5)).await);
//! let last = server.received().pop().unwrap();
//! assert_eq!(last.header("x-webhook-attempt"), Some("3"));
//!
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod request;
mod server;

pub use error::{Result, TestServerError};
pub use request::ReceivedRequest;
pub use server::TestServer;
