//! Error taxonomy and the crate-wide `Result` alias.
//!
//! Every fallible operation in Switchyard returns [`Result`]. The standard
//! combinators (`map`, `and_then`, `map_err`, `unwrap_or`) give the
//! railway-style composition: the first failure bypasses every later step.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Machine-checkable failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection refused, DNS failure, reset.
    Network,
    /// Per-call or per-attempt deadline exceeded.
    Timeout,
    /// Non-2xx status, transport-level rejection or malformed response.
    Protocol,
    /// Caller supplied a malformed request before any I/O happened.
    Validation,
    /// Unknown protocol name, missing or inconsistent option.
    Configuration,
    /// A plugin hook explicitly failed the call.
    Plugin,
}

impl ErrorKind {
    /// Stable name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "NetworkError",
            Self::Timeout => "TimeoutError",
            Self::Protocol => "ProtocolError",
            Self::Validation => "ValidationError",
            Self::Configuration => "ConfigurationError",
            Self::Plugin => "PluginError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client errors.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Transport could not reach the peer.
    #[error("Network error: {0}")]
    Network(String),

    /// Deadline exceeded.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The peer answered, but not with an acceptable response.
    #[error("Protocol error{}: {message}", fmt_status(.status))]
    Protocol {
        /// Status code reported by the transport, if any.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// Request rejected before dispatch.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Client or registry misconfiguration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A plugin failed the call.
    #[error("Plugin '{plugin}' failed: {message}")]
    Plugin {
        /// Name of the failing plugin.
        plugin: String,
        /// Error message.
        message: String,
    },

    /// Another error with added context. Keeps the kind of the wrapped error.
    #[error("{context}: {source}")]
    Context {
        /// Context message.
        context: String,
        /// The wrapped error.
        source: Box<ClientError>,
    },
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl ClientError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a protocol error carrying a status code.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a protocol error without a status code.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            status: None,
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a plugin error.
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Wrap this error with a context message.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The kind of this error. Context wrappers report the wrapped kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Plugin { .. } => ErrorKind::Plugin,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root_cause(&self) -> &ClientError {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Get the status code if this is a protocol error that carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self.root_cause() {
            Self::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if this error is retryable under the default policy.
    pub fn is_retryable(&self) -> bool {
        match self.root_cause() {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Protocol {
                status: Some(status),
                ..
            } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Check if this is a network error.
    pub fn is_network(&self) -> bool {
        self.kind() == ErrorKind::Network
    }
}

/// Extension methods for [`Result`].
pub trait ResultExt<T> {
    /// Wrap a failure with a context message, keeping its kind.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wrap a failure with a lazily built context message.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}
