//! Request metrics.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::{BeforeRequest, Hooks, Plugin, PluginContext, Request, Response, Result};

const METRICS_START: &str = "metrics.start";

/// Metrics for one completed call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMetrics {
    /// Protocol that served the call.
    pub protocol: String,
    /// Request method.
    pub method: String,
    /// Request target.
    pub target: String,
    /// Response status.
    pub status: u16,
    /// Time from the metrics before-hook to its after-hook.
    pub elapsed: Duration,
}

/// Point-in-time copy of the aggregate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Calls that reached the metrics before-hook.
    pub requests: u64,
    /// Calls that produced a response seen by the after-hook.
    pub responses: u64,
    /// Responses with a non-2xx status.
    pub error_responses: u64,
    /// Sum of response latencies, in microseconds.
    pub total_latency_us: u64,
}

impl MetricsSnapshot {
    /// Calls that started but never reached the after-hook
    /// (failures and short-circuited calls).
    pub fn incomplete(&self) -> u64 {
        self.requests.saturating_sub(self.responses)
    }

    /// Mean response latency.
    pub fn average_latency(&self) -> Option<Duration> {
        (self.responses > 0).then(|| Duration::from_micros(self.total_latency_us / self.responses))
    }
}

type Callback = Arc<dyn Fn(&RequestMetrics) + Send + Sync>;

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    responses: AtomicU64,
    error_responses: AtomicU64,
    total_latency_us: AtomicU64,
}

/// Metrics plugin with atomic counters and an optional per-call callback.
///
/// Register it last so its timing covers only the protocol round trip and
/// later plugins.
#[derive(Default)]
pub struct MetricsPlugin {
    counters: Arc<Counters>,
    callback: Option<Callback>,
}

impl MetricsPlugin {
    /// Create a metrics plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `f` with the metrics of every completed call.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestMetrics) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(f));
        self
    }

    /// Read the aggregate counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.counters.requests.load(Ordering::Relaxed),
            responses: self.counters.responses.load(Ordering::Relaxed),
            error_responses: self.counters.error_responses.load(Ordering::Relaxed),
            total_latency_us: self.counters.total_latency_us.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MetricsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsPlugin")
            .field("snapshot", &self.snapshot())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

struct Started {
    at: Instant,
    method: String,
    target: String,
}

#[async_trait]
impl Plugin for MetricsPlugin {
    fn name(&self) -> &str {
        "metrics"
    }

    fn hooks(&self) -> Hooks {
        Hooks::ALL
    }

    async fn before_request(&self, request: Request, ctx: &mut PluginContext) -> Result<BeforeRequest> {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        ctx.insert(
            METRICS_START,
            Started {
                at: Instant::now(),
                method: request.method().to_string(),
                target: request.target().to_string(),
            },
        );
        Ok(BeforeRequest::Continue(request))
    }

    async fn after_response(&self, response: Response, ctx: &mut PluginContext) -> Result<Response> {
        let Some(started) = ctx.remove::<Started>(METRICS_START) else {
            return Ok(response);
        };
        let elapsed = started.at.elapsed();

        self.counters.responses.fetch_add(1, Ordering::Relaxed);
        if !response.is_success() {
            self.counters.error_responses.fetch_add(1, Ordering::Relaxed);
        }
        self.counters
            .total_latency_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        if let Some(callback) = &self.callback {
            callback(&RequestMetrics {
                protocol: response.protocol().to_string(),
                method: started.method,
                target: started.target,
                status: response.status(),
                elapsed,
            });
        }
        Ok(response)
    }
}
