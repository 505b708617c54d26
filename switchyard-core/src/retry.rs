//! Retry policy and backoff strategies.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{ClientError, ErrorKind, Result};

/// Custom retry predicate.
pub type RetryPredicate = Arc<dyn Fn(&ClientError) -> bool + Send + Sync>;

/// Backoff strategy for retries.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(Duration),
    /// Linear backoff: delay increases by a fixed amount.
    Linear {
        /// Delay increment per attempt.
        delay: Duration,
        /// Maximum delay.
        max: Duration,
    },
    /// Exponential backoff: `initial * multiplier^(attempt - 1)`.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
        /// Maximum delay.
        max: Duration,
    },
    /// Exponential backoff plus up to 50% random jitter.
    ExponentialWithJitter {
        /// Initial delay.
        initial: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
        /// Maximum delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Create exponential backoff.
    pub fn exponential(initial: Duration, multiplier: f64) -> Self {
        Self::Exponential {
            initial,
            multiplier,
            max: Duration::from_secs(30),
        }
    }

    /// Set the maximum delay. No-op for `None` and `Constant`.
    pub fn with_max(self, max: Duration) -> Self {
        match self {
            Self::Linear { delay, .. } => Self::Linear { delay, max },
            Self::Exponential {
                initial,
                multiplier,
                ..
            } => Self::Exponential {
                initial,
                multiplier,
                max,
            },
            Self::ExponentialWithJitter {
                initial,
                multiplier,
                ..
            } => Self::ExponentialWithJitter {
                initial,
                multiplier,
                max,
            },
            other => other,
        }
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let n = attempt.max(1) - 1;
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Linear { delay, max } => delay.saturating_mul(n + 1).min(*max),
            Self::Exponential {
                initial,
                multiplier,
                max,
            } => scale(*initial, multiplier.powi(n as i32)).min(*max),
            Self::ExponentialWithJitter {
                initial,
                multiplier,
                max,
            } => {
                let base = scale(*initial, multiplier.powi(n as i32));
                let jitter = scale(base, fastrand::f64() * 0.5);
                base.saturating_add(jitter).min(*max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(100), 2.0)
    }
}

fn scale(duration: Duration, factor: f64) -> Duration {
    let secs = duration.as_secs_f64() * factor;
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::MAX
    }
}

/// Bookkeeping for one logical call.
#[derive(Debug)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: u32,
    /// When the first attempt started.
    pub started: Instant,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 0,
            started: Instant::now(),
        }
    }

    /// Time since the first attempt started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Retry policy wrapping a single protocol execution.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffStrategy,
    retry_status_codes: Vec<u16>,
    retry_on_network: bool,
    retry_on_timeout: bool,
    max_elapsed: Option<Duration>,
    predicate: Option<RetryPredicate>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::default(),
            retry_status_codes: vec![502, 503, 504],
            retry_on_network: true,
            retry_on_timeout: true,
            max_elapsed: None,
            predicate: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("retry_status_codes", &self.retry_status_codes)
            .field("retry_on_network", &self.retry_on_network)
            .field("retry_on_timeout", &self.retry_on_timeout)
            .field("max_elapsed", &self.max_elapsed)
            .field("custom_predicate", &self.predicate.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::exponential(base_delay, multiplier),
            ..Default::default()
        }
    }

    /// Create a policy with a constant delay.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::Constant(delay),
            ..Default::default()
        }
    }

    /// Create a policy that retries without delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::None,
            ..Default::default()
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::immediate(1)
    }

    /// Maximum attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Get the backoff strategy.
    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }

    /// Set the maximum attempts (at least one).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the retryable status codes.
    pub fn with_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retry_status_codes = codes;
        self
    }

    /// Disable retry on network errors.
    pub fn no_retry_on_network(mut self) -> Self {
        self.retry_on_network = false;
        self
    }

    /// Disable retry on timeout errors.
    pub fn no_retry_on_timeout(mut self) -> Self {
        self.retry_on_timeout = false;
        self
    }

    /// Stop retrying once this much time has passed since the first attempt.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = Some(max_elapsed);
        self
    }

    /// Replace the default retry decision.
    ///
    /// Validation and configuration errors are never retried, whatever the
    /// predicate says.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ClientError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Check if a failure should be retried.
    pub fn is_retryable(&self, error: &ClientError) -> bool {
        match error.kind() {
            ErrorKind::Validation | ErrorKind::Configuration => return false,
            _ => {}
        }
        if let Some(predicate) = &self.predicate {
            return predicate(error);
        }
        match error.kind() {
            ErrorKind::Network => self.retry_on_network,
            ErrorKind::Timeout => self.retry_on_timeout,
            ErrorKind::Protocol => error
                .status_code()
                .is_some_and(|status| self.retry_status_codes.contains(&status)),
            _ => false,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The closure receives the 1-indexed
    /// attempt number. The last failure is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = RetryState::new();

        loop {
            state.attempt += 1;

            let error = match operation(state.attempt).await {
                Ok(value) => {
                    if state.attempt > 1 {
                        debug!(attempt = state.attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !self.is_retryable(&error) {
                return Err(error);
            }
            if state.attempt >= self.max_attempts {
                warn!(
                    attempts = state.attempt,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(error);
            }

            let delay = self.backoff.delay_after(state.attempt);
            if let Some(max_elapsed) = self.max_elapsed
                && state.elapsed().saturating_add(delay) > max_elapsed
            {
                warn!(
                    attempts = state.attempt,
                    elapsed_ms = state.elapsed().as_millis() as u64,
                    "Retry time budget exhausted"
                );
                return Err(error);
            }

            debug!(
                attempt = state.attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
