//! Protocol-independent response.

use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::{ClientError, Result};

/// Response produced by a protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
    decoded: Option<Value>,
    elapsed: Duration,
    protocol: String,
}

impl Response {
    /// Create an empty response with the given status.
    pub fn new(protocol: impl Into<String>, status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            decoded: None,
            elapsed: Duration::ZERO,
            protocol: protocol.into(),
        }
    }

    /// Set the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the decoded body.
    pub fn with_decoded(mut self, decoded: Value) -> Self {
        self.decoded = Some(decoded);
        self
    }

    /// Set the elapsed time.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Get the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Check if the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value as a string.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the raw body.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Get the decoded body, if the protocol produced one.
    pub fn decoded(&self) -> Option<&Value> {
        self.decoded.as_ref()
    }

    /// Get the elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Name of the protocol that produced this response.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| ClientError::protocol(format!("response body is not UTF-8: {e}")))
    }

    /// Deserialize the body. Uses the decoded form when present.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let parsed = match &self.decoded {
            Some(value) => serde_json::from_value(value.clone()),
            None => serde_json::from_slice(&self.body),
        };
        parsed.map_err(|e| ClientError::protocol(format!("malformed response body: {e}")))
    }

    /// Turn non-2xx responses into protocol errors.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = match self.text() {
            Ok(text) if !text.is_empty() => truncate(&text, 512),
            _ => http::StatusCode::from_u16(self.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("unexpected status")
                .to_string(),
        };
        Err(ClientError::status(self.status, message))
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_prefers_decoded() {
        let response = Response::new("http", 200)
            .with_body("not json")
            .with_decoded(json!({"id": 7}));

        let value: Value = response.json().unwrap();
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn test_error_for_status() {
        let err = Response::new("http", 503).error_for_status().unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert!(err.to_string().contains("Service Unavailable"));

        let ok = Response::new("http", 204).error_for_status();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_error_for_status_uses_body() {
        let err = Response::new("http", 400)
            .with_body("missing field 'name'")
            .error_for_status()
            .unwrap_err();
        assert!(err.to_string().contains("missing field 'name'"));
    }
}
