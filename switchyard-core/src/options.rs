//! Per-call options.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::{ClientError, Result};

/// Options for a single call.
///
/// Deserializes from a JSON object. Keys other than the recognized ones
/// become protocol extensions, e.g. `query` and `variables` for GraphQL:
///
/// ```
/// use switchyard_core::RequestOptions;
///
/// let options: RequestOptions = serde_json::from_str(
///     r#"{"protocol": "graphql", "timeout": 2, "query": "{ me { id } }"}"#,
/// ).unwrap();
/// assert!(options.extensions.contains_key("query"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Protocol to route through instead of the client default.
    pub protocol: Option<String>,
    /// Per-call deadline in seconds, clamped to the protocol's bounds.
    #[serde(with = "crate::config::duration_secs_opt")]
    pub timeout: Option<Duration>,
    /// Headers for this call. They override client defaults.
    pub headers: BTreeMap<String, String>,
    /// Retries after the first attempt. Overrides the client policy budget.
    pub retries: Option<u32>,
    /// Base URL for this call.
    #[serde(alias = "url")]
    pub base_url: Option<String>,
    /// JSON body.
    pub body: Option<Value>,
    /// Protocol-specific fields.
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl RequestOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| ClientError::validation(format!("invalid request options: {e}")))
    }

    /// Route through a named protocol.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Set the per-call deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the retry budget for this call.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set the base URL for this call.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let body = serde_json::to_value(body)
            .map_err(|e| ClientError::validation(format!("failed to serialize body: {e}")))?;
        self.body = Some(body);
        Ok(self)
    }

    /// Set a protocol extension field.
    pub fn extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }
}
