//! Static description of what a protocol supports.

use std::time::Duration;

use crate::{ClientError, Request, Result};

/// Capability descriptor reported by a protocol.
///
/// Computed once when the protocol is registered and cached by the
/// registry; read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Supports streaming bodies.
    pub streaming: bool,
    /// Supports non-UTF-8 payloads.
    pub binary: bool,
    /// Supports transparent compression.
    pub compression: bool,
    /// Largest accepted request body in bytes.
    pub max_request_size: Option<usize>,
    /// Shortest accepted per-call timeout.
    pub min_timeout: Duration,
    /// Longest accepted per-call timeout.
    pub max_timeout: Duration,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            streaming: false,
            binary: false,
            compression: false,
            max_request_size: None,
            min_timeout: Duration::from_millis(1),
            max_timeout: Duration::from_secs(300),
        }
    }
}

impl Capabilities {
    /// Create a descriptor with default bounds and no optional features.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set streaming support.
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    /// Set binary payload support.
    pub fn with_binary(mut self, enabled: bool) -> Self {
        self.binary = enabled;
        self
    }

    /// Set compression support.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Set the maximum request size.
    pub fn with_max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = Some(size);
        self
    }

    /// Set the timeout bounds.
    pub fn with_timeout_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.min_timeout = min;
        self.max_timeout = max;
        self
    }

    /// Check that the descriptor is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.max_timeout.is_zero() {
            return Err(ClientError::configuration("max_timeout must be greater than zero"));
        }
        if self.min_timeout > self.max_timeout {
            return Err(ClientError::configuration(format!(
                "min_timeout {:?} exceeds max_timeout {:?}",
                self.min_timeout, self.max_timeout
            )));
        }
        if self.max_request_size == Some(0) {
            return Err(ClientError::configuration("max_request_size must be greater than zero"));
        }
        Ok(())
    }

    /// Clamp a timeout into the supported bounds.
    pub fn clamp_timeout(&self, timeout: Duration) -> Duration {
        timeout.clamp(self.min_timeout, self.max_timeout)
    }

    /// Reject requests the protocol cannot carry.
    pub fn check_request(&self, request: &Request) -> Result<()> {
        let Some(body) = request.body() else {
            return Ok(());
        };

        if let Some(max) = self.max_request_size {
            let len = body.len()?;
            if len > max {
                return Err(ClientError::validation(format!(
                    "request body of {len} bytes exceeds the limit of {max} bytes"
                )));
            }
        }

        if !self.binary && !body.is_text() {
            return Err(ClientError::validation(
                "protocol does not support binary payloads",
            ));
        }

        Ok(())
    }
}
