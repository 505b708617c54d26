//! Request/response logging.

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{BeforeRequest, Hooks, Plugin, PluginContext, Request, Response, Result};

const STARTED_AT: &str = "logging.started_at";

/// Logging plugin that logs requests and responses.
#[derive(Debug, Default)]
pub struct LoggingPlugin {
    log_headers: bool,
}

impl LoggingPlugin {
    /// Create a new logging plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

#[async_trait]
impl Plugin for LoggingPlugin {
    fn name(&self) -> &str {
        "logging"
    }

    fn hooks(&self) -> Hooks {
        Hooks::ALL
    }

    async fn before_request(&self, request: Request, ctx: &mut PluginContext) -> Result<BeforeRequest> {
        debug!(
            protocol = ctx.protocol(),
            method = %request.method(),
            target = request.target(),
            "Sending request"
        );
        if self.log_headers {
            for (name, value) in request.headers() {
                trace!(header = %name, value = ?value, "Request header");
            }
        }
        ctx.insert(STARTED_AT, Instant::now());
        Ok(BeforeRequest::Continue(request))
    }

    async fn after_response(&self, response: Response, ctx: &mut PluginContext) -> Result<Response> {
        let elapsed_ms = ctx
            .get::<Instant>(STARTED_AT)
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or_default();
        debug!(
            protocol = response.protocol(),
            status = response.status(),
            elapsed_ms,
            "Received response"
        );
        if self.log_headers {
            for (name, value) in response.headers() {
                trace!(header = %name, value = ?value, "Response header");
            }
        }
        Ok(response)
    }
}
