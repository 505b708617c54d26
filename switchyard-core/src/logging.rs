//! Subscriber setup driven by environment variables.
//!
//! - `SWITCHYARD_DEBUG=1` - Enable debug logging
//! - `SWITCHYARD_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `SWITCHYARD_LOG_FORMAT=pretty|compact|json` - Set output format
//! - `SWITCHYARD_LOG_COLOR=1|0` - Enable/disable colors
//!
//! `RUST_LOG`, when set, replaces the level with a full `EnvFilter` directive.

use std::env;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Output format for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-oriented format.
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for structured logging.
    Json,
}

impl LogFormat {
    /// Get format from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Whether debug mode is enabled.
    pub debug: bool,
    /// Minimum log level.
    pub level: LevelFilter,
    /// Output format.
    pub format: LogFormat,
    /// Whether ANSI colors are enabled.
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
            color: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let debug = flag("SWITCHYARD_DEBUG").unwrap_or(false);
        let level = lookup("SWITCHYARD_LOG_LEVEL")
            .and_then(|s| s.parse::<LevelFilter>().ok())
            .unwrap_or(if debug { LevelFilter::DEBUG } else { LevelFilter::INFO });
        let format = lookup("SWITCHYARD_LOG_FORMAT")
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or(LogFormat::Compact);
        let color = flag("SWITCHYARD_LOG_COLOR").unwrap_or(false);

        Self {
            debug,
            level,
            format,
            color,
        }
    }

    /// Install a global fmt subscriber.
    ///
    /// Returns `false` if a global subscriber was already set.
    pub fn init(&self) -> bool {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(self.color);

        let result = match self.format {
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
        result.is_ok()
    }
}

/// Initialize logging from the environment.
pub fn init() -> bool {
    LogConfig::from_env().init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> LogConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]), LogConfig::default());
    }

    #[test]
    fn test_debug_raises_level() {
        let config = config(&[("SWITCHYARD_DEBUG", "1")]);
        assert!(config.debug);
        assert_eq!(config.level, LevelFilter::DEBUG);
    }

    #[test]
    fn test_explicit_level_and_format() {
        let config = config(&[
            ("SWITCHYARD_DEBUG", "true"),
            ("SWITCHYARD_LOG_LEVEL", "warn"),
            ("SWITCHYARD_LOG_FORMAT", "JSON"),
        ]);
        assert_eq!(config.level, LevelFilter::WARN);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[("SWITCHYARD_LOG_LEVEL", "loud"), ("SWITCHYARD_LOG_FORMAT", "xml")]);
        assert_eq!(config.level, LevelFilter::INFO);
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LogConfig::default();
        config.init();
        assert!(!config.init());
    }
}
