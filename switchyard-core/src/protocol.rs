//! Transport abstraction.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::{Capabilities, ClientError, Request, Response, Result};

/// A transport implementation (HTTP, GraphQL, WebSocket, ...).
///
/// Constructing a protocol value is the "create client" step: the value owns
/// whatever client handle or connection pool the transport needs, and is
/// shared by every call routed to it.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Transport name, e.g. `"http"`.
    fn name(&self) -> &str;

    /// Report what this transport supports.
    fn capabilities(&self) -> Capabilities;

    /// Execute one request.
    async fn execute(&self, request: Request) -> Result<Response>;

    /// Probe the remote end.
    ///
    /// `Ok(false)` means the peer is reachable in principle but unhealthy or
    /// unreachable right now; `Err` is reserved for misconfiguration.
    async fn health_check(&self) -> Result<bool>;
}

impl std::fmt::Debug for dyn Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol").field("name", &self.name()).finish()
    }
}

/// Constructor stored by the registry.
pub type ProtocolFactory = Arc<dyn Fn(&ProtocolConfig) -> Result<Arc<dyn Protocol>> + Send + Sync>;

/// Settings handed to a protocol constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Base URL relative targets are resolved against.
    pub base_url: Option<String>,
    /// Per-attempt transport timeout.
    #[serde(with = "crate::config::duration_secs_opt")]
    pub timeout: Option<Duration>,
    /// Connection timeout.
    #[serde(with = "crate::config::duration_secs_opt")]
    pub connect_timeout: Option<Duration>,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// User agent string.
    pub user_agent: Option<String>,
    /// Protocol-specific settings.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ProtocolConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Add a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set a protocol-specific setting.
    pub fn setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Deserialize the protocol-specific settings into a typed struct.
    pub fn settings_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.settings.clone()))
            .map_err(|e| ClientError::configuration(format!("invalid protocol settings: {e}")))
    }
}
