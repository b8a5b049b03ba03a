// hookline - at-least-once webhook dispatch for Rust
//
// Subscriptions, signed deliveries, retries with backoff and a receiver-side
// verifier. The `testing` feature adds a recording HTTP server for tests.

// Re-export core functionality
pub use hookline_webhooks::*;

// Re-export optional crates
#[cfg(feature = "testing")]
pub use hookline_testing;
