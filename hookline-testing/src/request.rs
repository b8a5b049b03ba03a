//! Requests captured by the test server

use crate::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One request as seen by the test server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedRequest {
    pub method: String,

    /// Path including any query string
    pub path: String,

    /// Header names are lowercase
    pub headers: HashMap<String, String>,

    /// Raw body bytes, exactly as received
    pub body: Vec<u8>,

    pub received_at: DateTime<Utc>,
}

impl ReceivedRequest {
    /// Look up a header by name, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body as UTF-8 text (lossy)
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &str) -> ReceivedRequest {
        let mut headers = HashMap::new();
        headers.insert("x-webhook-signature".to_string(), "abc".to_string());
        ReceivedRequest {
            method: "POST".into(),
            path: "/hook".into(),
            headers,
            body: body.as_bytes().to_vec(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let req = request("{}");
        assert_eq!(req.header("X-Webhook-Signature"), Some("abc"));
        assert_eq!(req.header("x-webhook-signature"), Some("abc"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn test_json_body() {
        let req = request(r#"{"event":"user_signup"}"#);
        let value: serde_json::Value = req.json().unwrap();
        assert_eq!(value["event"], "user_signup");

        assert!(request("nope").json::<serde_json::Value>().is_err());
    }
}
