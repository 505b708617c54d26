//! HTTP transport configuration.

use serde::Deserialize;
use std::time::Duration;
use switchyard_core::{ClientError, ProtocolConfig, Result};

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL relative targets are resolved against.
    pub base_url: Option<String>,
    /// Default per-attempt timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Default headers for all requests.
    pub default_headers: Vec<(String, String)>,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip compression.
    pub gzip: bool,
    /// Enable brotli compression.
    pub brotli: bool,
    /// Follow redirects.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
    /// Path probed by the health check, relative to the base URL.
    pub health_path: String,
    /// Largest accepted request body in bytes.
    pub max_request_size: Option<usize>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            default_headers: Vec::new(),
            user_agent: format!("switchyard-http/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            brotli: true,
            follow_redirects: true,
            max_redirects: 10,
            health_path: "/health".to_string(),
            max_request_size: None,
        }
    }
}

/// Transport-specific keys accepted in [`ProtocolConfig::settings`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpSettings {
    gzip: Option<bool>,
    brotli: Option<bool>,
    follow_redirects: Option<bool>,
    max_redirects: Option<usize>,
    pool_max_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<f64>,
    health_path: Option<String>,
    max_request_size: Option<usize>,
}

impl HttpConfig {
    /// Create a new configuration builder.
    pub fn builder() -> HttpConfigBuilder {
        HttpConfigBuilder::default()
    }

    /// Build from generic protocol settings.
    pub fn from_protocol_config(config: &ProtocolConfig) -> Result<Self> {
        let settings: HttpSettings = config.settings_as()?;
        let defaults = Self::default();

        let pool_idle_timeout = match settings.pool_idle_timeout {
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|e| {
                ClientError::configuration(format!("invalid pool_idle_timeout: {e}"))
            })?,
            None => defaults.pool_idle_timeout,
        };

        Ok(Self {
            base_url: config.base_url.clone(),
            timeout: config.timeout.unwrap_or(defaults.timeout),
            connect_timeout: config.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_timeout,
            pool_max_idle_per_host: settings
                .pool_max_idle_per_host
                .unwrap_or(defaults.pool_max_idle_per_host),
            default_headers: config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            user_agent: config.user_agent.clone().unwrap_or(defaults.user_agent),
            gzip: settings.gzip.unwrap_or(defaults.gzip),
            brotli: settings.brotli.unwrap_or(defaults.brotli),
            follow_redirects: settings.follow_redirects.unwrap_or(defaults.follow_redirects),
            max_redirects: settings.max_redirects.unwrap_or(defaults.max_redirects),
            health_path: settings.health_path.unwrap_or(defaults.health_path),
            max_request_size: settings.max_request_size,
        })
    }
}

/// Builder for HTTP transport configuration.
#[derive(Debug, Default)]
pub struct HttpConfigBuilder {
    config: HttpConfig,
}

impl HttpConfigBuilder {
    /// Set the base URL for all requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the maximum idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Add a default header for all requests.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip compression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Enable or disable brotli compression.
    pub fn brotli(mut self, enable: bool) -> Self {
        self.config.brotli = enable;
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Set the health check path.
    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.config.health_path = path.into();
        self
    }

    /// Limit request body size.
    pub fn max_request_size(mut self, bytes: usize) -> Self {
        self.config.max_request_size = Some(bytes);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HttpConfig {
        self.config
    }
}
