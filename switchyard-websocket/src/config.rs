//! WebSocket transport configuration.

use serde::Deserialize;
use std::time::Duration;
use switchyard_core::{ProtocolConfig, Result};

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Base `ws://` or `wss://` URL relative targets are resolved against.
    pub base_url: Option<String>,
    /// Default time allowed for one request/reply exchange.
    pub timeout: Duration,
    /// Handshake timeout.
    pub connect_timeout: Duration,
    /// Headers sent with the opening handshake.
    pub headers: Vec<(String, String)>,
    /// Largest message accepted in either direction.
    pub max_message_size: Option<usize>,
    /// Idle connections kept per URL.
    pub max_idle_per_url: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            headers: Vec::new(),
            max_message_size: Some(64 << 20),
            max_idle_per_url: 4,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WebSocketSettings {
    max_message_size: Option<usize>,
    max_idle_per_url: Option<usize>,
}

impl WebSocketConfig {
    /// Create a configuration with a base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Default::default()
        }
    }

    /// Set the exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Add a handshake header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the message size limit.
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = Some(bytes);
        self
    }

    /// Set how many idle connections are kept per URL. Zero disables pooling.
    pub fn with_max_idle_per_url(mut self, max: usize) -> Self {
        self.max_idle_per_url = max;
        self
    }

    /// Build from generic protocol settings.
    pub fn from_protocol_config(config: &ProtocolConfig) -> Result<Self> {
        let settings: WebSocketSettings = config.settings_as()?;
        let defaults = Self::default();

        Ok(Self {
            base_url: config.base_url.clone(),
            timeout: config.timeout.unwrap_or(defaults.timeout),
            connect_timeout: config.connect_timeout.unwrap_or(defaults.connect_timeout),
            headers: config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            max_message_size: settings.max_message_size.or(defaults.max_message_size),
            max_idle_per_url: settings.max_idle_per_url.unwrap_or(defaults.max_idle_per_url),
        })
    }
}
