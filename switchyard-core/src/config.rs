//! Client configuration.
//!
//! Settings are loaded from TOML or JSON files, or from the environment,
//! and validated before a client is built from them.

use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::retry::{BackoffStrategy, RetryPolicy};
use crate::{ClientError, ProtocolConfig, Result};

/// Prefix of the environment variables read by [`ClientConfig::from_env`].
pub const ENV_PREFIX: &str = "SWITCHYARD_";

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// JSON.
    Json,
    /// TOML.
    Toml,
}

impl FileFormat {
    /// Pick a format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Delay cap, in milliseconds.
    pub max_delay_ms: u64,
    /// Add random jitter to each delay.
    pub jitter: bool,
    /// Status codes that are retried.
    pub status_codes: Vec<u16>,
    /// Retry network errors.
    pub retry_on_network: bool,
    /// Retry timeouts.
    pub retry_on_timeout: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: false,
            status_codes: vec![502, 503, 504],
            retry_on_network: true,
            retry_on_timeout: true,
        }
    }
}

impl RetryConfig {
    /// Build the retry policy these settings describe.
    pub fn to_policy(&self) -> RetryPolicy {
        let initial = Duration::from_millis(self.base_delay_ms);
        let max = Duration::from_millis(self.max_delay_ms);
        let backoff = if self.jitter {
            BackoffStrategy::ExponentialWithJitter {
                initial,
                multiplier: self.multiplier,
                max,
            }
        } else {
            BackoffStrategy::Exponential {
                initial,
                multiplier: self.multiplier,
                max,
            }
        };

        let mut policy = RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_backoff(backoff)
            .with_status_codes(self.status_codes.clone());
        if !self.retry_on_network {
            policy = policy.no_retry_on_network();
        }
        if !self.retry_on_timeout {
            policy = policy.no_retry_on_timeout();
        }
        policy
    }
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live, in seconds.
    pub ttl_secs: u64,
    /// Cacheable methods.
    pub methods: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            methods: vec!["GET".into(), "HEAD".into()],
        }
    }
}

impl CacheConfig {
    /// Entry time-to-live.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Parse the cacheable methods.
    pub fn parsed_methods(&self) -> Result<Vec<Method>> {
        self.methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_uppercase().as_bytes())
                    .map_err(|_| ClientError::configuration(format!("invalid cache method '{m}'")))
            })
            .collect()
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Protocol used when a call does not name one.
    pub default_protocol: String,
    /// Per-call deadline covering every attempt, in seconds.
    #[serde(with = "duration_secs_opt")]
    pub timeout: Option<Duration>,
    /// Base URL relative targets are resolved against.
    pub base_url: Option<String>,
    /// Headers sent with every call.
    pub headers: BTreeMap<String, String>,
    /// Retry settings.
    pub retry: RetryConfig,
    /// Cache settings. No cache plugin is installed when absent.
    pub cache: Option<CacheConfig>,
    /// Per-protocol settings.
    pub protocols: BTreeMap<String, ProtocolConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_protocol: "http".to_string(),
            timeout: None,
            base_url: None,
            headers: BTreeMap::new(),
            retry: RetryConfig::default(),
            cache: None,
            protocols: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Parse TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::configuration(format!("TOML parse error: {e}")))
    }

    /// Parse JSON.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| ClientError::configuration(format!("JSON parse error: {e}")))
    }

    /// Load a file, picking the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ClientError::configuration("no file extension found"))?;
        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ClientError::configuration(format!("unsupported format: {ext}")))?;

        let content = fs::read_to_string(path).map_err(|e| {
            ClientError::configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), ?format, "Loading client configuration");

        let config = match format {
            FileFormat::Json => Self::from_json_str(&content)?,
            FileFormat::Toml => Self::from_toml_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overlaid with `SWITCHYARD_*` variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `SWITCHYARD_*` pairs onto this configuration.
    ///
    /// Recognized keys: `DEFAULT_PROTOCOL`, `TIMEOUT`, `BASE_URL`,
    /// `RETRY_MAX_ATTEMPTS`, `RETRY_BASE_DELAY_MS`, `RETRY_MULTIPLIER`,
    /// `CACHE_TTL_SECS` and `HEADER_<NAME>` (underscores become dashes).
    /// Other keys are ignored.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(key) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "DEFAULT_PROTOCOL" => self.default_protocol = value,
                "TIMEOUT" => self.timeout = Some(parse_secs(key, &value)?),
                "BASE_URL" => self.base_url = Some(value),
                "RETRY_MAX_ATTEMPTS" => self.retry.max_attempts = parse_env(key, &value)?,
                "RETRY_BASE_DELAY_MS" => self.retry.base_delay_ms = parse_env(key, &value)?,
                "RETRY_MULTIPLIER" => self.retry.multiplier = parse_env(key, &value)?,
                "CACHE_TTL_SECS" => {
                    self.cache.get_or_insert_with(CacheConfig::default).ttl_secs =
                        parse_env(key, &value)?;
                }
                other => {
                    if let Some(header) = other.strip_prefix("HEADER_") {
                        self.headers
                            .insert(header.to_lowercase().replace('_', "-"), value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> Result<()> {
        if self.default_protocol.trim().is_empty() {
            return Err(ClientError::configuration("default_protocol must not be empty"));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ClientError::configuration("timeout must be greater than zero"));
        }
        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url).map_err(|e| {
                ClientError::configuration(format!("invalid base_url '{base_url}': {e}"))
            })?;
        }
        if self.retry.max_attempts == 0 {
            return Err(ClientError::configuration("retry.max_attempts must be at least 1"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ClientError::configuration("retry.multiplier must be at least 1.0"));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ClientError::configuration(
                "retry.max_delay_ms must not be less than retry.base_delay_ms",
            ));
        }
        if let Some(cache) = &self.cache {
            if cache.ttl_secs == 0 {
                return Err(ClientError::configuration("cache.ttl_secs must be greater than zero"));
            }
            cache.parsed_methods()?;
        }
        Ok(())
    }

    /// Settings for one protocol, or defaults if none were given.
    pub fn protocol(&self, name: &str) -> ProtocolConfig {
        self.protocols.get(name).cloned().unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ClientError::configuration(format!("invalid {ENV_PREFIX}{key} '{value}': {e}")))
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: f64 = parse_env(key, value)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ClientError::configuration(format!("invalid {ENV_PREFIX}{key} '{value}': {e}")))
}

/// Serde adapter for `Option<Duration>` written as fractional seconds.
pub mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize as seconds.
    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from seconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
