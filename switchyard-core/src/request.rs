//! Protocol-independent request.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::{ClientError, Result};

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Raw bytes, sent as-is.
    Bytes(Bytes),
    /// Structured payload, serialized as JSON by the transport.
    Json(Value),
}

impl Body {
    /// Create a JSON body from a serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| ClientError::validation(format!("failed to serialize JSON body: {e}")))
    }

    /// Encode the body as bytes.
    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Json(value) => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|e| ClientError::validation(format!("failed to encode JSON body: {e}"))),
        }
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> Result<usize> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.len()),
            Self::Json(_) => self.to_bytes().map(|b| b.len()),
        }
    }

    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Json(_) => false,
        }
    }

    /// Check if this is a structured body.
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Check if the body can be carried as text.
    pub fn is_text(&self) -> bool {
        match self {
            Self::Bytes(bytes) => std::str::from_utf8(bytes).is_ok(),
            Self::Json(_) => true,
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Bytes(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// An outbound request.
///
/// Requests are values: every `with_*` method consumes the request and
/// returns a new one, so a template request can be cloned and shared by
/// concurrent calls without any of them observing another's changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Option<Body>,
    timeout: Option<Duration>,
    extensions: Map<String, Value>,
}

impl Request {
    /// Create a new request.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            extensions: Map::new(),
        }
    }

    /// Create a GET request.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// Create a POST request.
    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    /// Get the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the target address.
    pub fn target(&self) -> &str {
        &self.target
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

    /// Get the body.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Get the per-call timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Get the protocol-specific extension fields.
    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    /// Get one extension field.
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Replace the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replace the target address.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Set a header. Names are case-insensitive; the last write wins.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ClientError::validation(format!("invalid header name '{}': {e}", name.as_ref())))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ClientError::validation(format!("invalid value for header '{name}': {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Merge headers, replacing existing values for the same names.
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        for name in headers.keys() {
            self.headers.remove(name);
        }
        for (name, value) in headers {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Remove a header.
    pub fn without_header(mut self, name: impl AsRef<str>) -> Self {
        self.headers.remove(name.as_ref());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body from a serializable value.
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self> {
        Ok(self.with_body(Body::json(value)?))
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set an extension field.
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Merge extension fields.
    pub fn with_extensions(mut self, extensions: Map<String, Value>) -> Self {
        self.extensions.extend(extensions);
        self
    }

    /// Check the request for problems that make dispatch pointless.
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() && self.extensions.is_empty() {
            return Err(ClientError::validation("request target is empty"));
        }
        if let Some(timeout) = self.timeout
            && timeout.is_zero()
        {
            return Err(ClientError::validation("request timeout must be greater than zero"));
        }
        Ok(())
    }
}
