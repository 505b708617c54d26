//! Ordered plugin pipeline around protocol execution.
//!
//! Before-hooks run in registration order, each seeing the request produced
//! by the previous one. The dispatch step runs only if every before-hook
//! continued. After-hooks then run in the same registration order over the
//! response. The first failure in either phase ends the call.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::{BeforeRequest, Plugin, PluginContext, Request, Response, Result};

/// Ordered list of plugins.
#[derive(Clone)]
pub struct Pipeline {
    plugins: Arc<[Arc<dyn Plugin>]>,
}

impl Pipeline {
    /// Create a pipeline from plugins in registration order.
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            plugins: plugins.into(),
        }
    }

    /// Plugins in registration order.
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Number of plugins, including disabled ones.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if the pipeline has no plugins.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run every enabled before-hook.
    pub async fn run_before(
        &self,
        mut request: Request,
        ctx: &mut PluginContext,
    ) -> Result<BeforeRequest> {
        for plugin in self.plugins.iter() {
            if !plugin.enabled() || !plugin.hooks().before_request() {
                continue;
            }
            trace!(plugin = plugin.name(), "Running before-request hook");

            match plugin.before_request(request, ctx).await? {
                BeforeRequest::Continue(next) => request = next,
                BeforeRequest::Respond(response) => {
                    debug!(plugin = plugin.name(), "Plugin answered the request, skipping dispatch");
                    return Ok(BeforeRequest::Respond(response));
                }
            }
        }
        Ok(BeforeRequest::Continue(request))
    }

    /// Run every enabled after-hook.
    pub async fn run_after(&self, mut response: Response, ctx: &mut PluginContext) -> Result<Response> {
        for plugin in self.plugins.iter() {
            if !plugin.enabled() || !plugin.hooks().after_response() {
                continue;
            }
            trace!(plugin = plugin.name(), "Running after-response hook");
            response = plugin.after_response(response, ctx).await?;
        }
        Ok(response)
    }

    /// Run the before-hooks, `dispatch`, then the after-hooks.
    ///
    /// A dispatch failure is returned as-is; after-hooks only see responses.
    pub async fn execute<F, Fut>(
        &self,
        request: Request,
        ctx: &mut PluginContext,
        dispatch: F,
    ) -> Result<Response>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<Response>>,
    {
        let request = match self.run_before(request, ctx).await? {
            BeforeRequest::Continue(request) => request,
            BeforeRequest::Respond(response) => return Ok(response),
        };

        let response = dispatch(request).await?;
        self.run_after(response, ctx).await
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.plugins.iter().map(|p| p.name()).collect();
        f.debug_struct("Pipeline").field("plugins", &names).finish()
    }
}
