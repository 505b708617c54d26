//! GraphQL transport configuration.

use serde::Deserialize;
use std::time::Duration;
use switchyard_core::{ClientError, ProtocolConfig, Result};
use url::Url;

/// GraphQL transport configuration.
#[derive(Debug, Clone)]
pub struct GraphqlConfig {
    /// GraphQL endpoint URL.
    pub endpoint: Option<String>,
    /// Default per-attempt timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Default headers.
    pub headers: Vec<(String, String)>,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip compression.
    pub gzip: bool,
    /// Largest accepted request payload in bytes.
    pub max_request_size: Option<usize>,
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            headers: Vec::new(),
            user_agent: format!("switchyard-graphql/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            max_request_size: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GraphqlSettings {
    endpoint: Option<String>,
    gzip: Option<bool>,
    max_request_size: Option<usize>,
}

impl GraphqlConfig {
    /// Create a configuration for an endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a default header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Limit the request payload size.
    pub fn with_max_request_size(mut self, bytes: usize) -> Self {
        self.max_request_size = Some(bytes);
        self
    }

    /// Build from generic protocol settings.
    ///
    /// The `endpoint` setting may be absolute or relative to `base_url`;
    /// without it the base URL itself is the endpoint.
    pub fn from_protocol_config(config: &ProtocolConfig) -> Result<Self> {
        let settings: GraphqlSettings = config.settings_as()?;
        let defaults = Self::default();

        let endpoint = match (settings.endpoint, &config.base_url) {
            (Some(endpoint), _) if Url::parse(&endpoint).is_ok() => Some(endpoint),
            (Some(endpoint), Some(base)) => {
                let base = Url::parse(base).map_err(|e| {
                    ClientError::configuration(format!("invalid base_url '{base}': {e}"))
                })?;
                let joined = base.join(&endpoint).map_err(|e| {
                    ClientError::configuration(format!("invalid endpoint '{endpoint}': {e}"))
                })?;
                Some(joined.to_string())
            }
            (Some(endpoint), None) => {
                return Err(ClientError::configuration(format!(
                    "relative endpoint '{endpoint}' requires a base_url"
                )));
            }
            (None, base) => base.clone(),
        };

        Ok(Self {
            endpoint,
            timeout: config.timeout.unwrap_or(defaults.timeout),
            connect_timeout: config.connect_timeout.unwrap_or(defaults.connect_timeout),
            headers: config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            user_agent: config.user_agent.clone().unwrap_or(defaults.user_agent),
            gzip: settings.gzip.unwrap_or(defaults.gzip),
            max_request_size: settings.max_request_size,
        })
    }
}
