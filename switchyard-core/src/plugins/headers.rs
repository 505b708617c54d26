//! Header injection plugins.

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::{BeforeRequest, ClientError, Hooks, Plugin, PluginContext, Request, Result};

/// Header carrying the generated request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Adds default headers the request does not already carry.
#[derive(Debug, Clone, Default)]
pub struct HeadersPlugin {
    headers: HeaderMap,
}

impl HeadersPlugin {
    /// Create an empty plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a default header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ClientError::configuration(format!("invalid header name: {e}")))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ClientError::configuration(format!("invalid header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

#[async_trait]
impl Plugin for HeadersPlugin {
    fn name(&self) -> &str {
        "headers"
    }

    fn hooks(&self) -> Hooks {
        if self.headers.is_empty() {
            Hooks::NONE
        } else {
            Hooks::BEFORE_REQUEST
        }
    }

    async fn before_request(&self, request: Request, _ctx: &mut PluginContext) -> Result<BeforeRequest> {
        let mut missing = HeaderMap::new();
        for (name, value) in &self.headers {
            if !request.headers().contains_key(name) {
                missing.insert(name.clone(), value.clone());
            }
        }
        Ok(BeforeRequest::Continue(request.with_headers(&missing)))
    }
}

/// Tags each request with a UUID v4 `X-Request-ID` unless one is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdPlugin;

impl RequestIdPlugin {
    /// Create the plugin.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for RequestIdPlugin {
    fn name(&self) -> &str {
        "request-id"
    }

    fn hooks(&self) -> Hooks {
        Hooks::BEFORE_REQUEST
    }

    async fn before_request(&self, request: Request, ctx: &mut PluginContext) -> Result<BeforeRequest> {
        if let Some(id) = request.header(REQUEST_ID_HEADER) {
            ctx.insert("request.id", id.to_string());
            return Ok(BeforeRequest::Continue(request));
        }
        let id = uuid::Uuid::new_v4().to_string();
        ctx.insert("request.id", id.clone());
        Ok(BeforeRequest::Continue(request.with_header(REQUEST_ID_HEADER, id)?))
    }
}
