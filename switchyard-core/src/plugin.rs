//! Plugin contract.

use async_trait::async_trait;
use std::ops::BitOr;

use crate::{PluginContext, Request, Response, Result};

/// The set of hooks a plugin implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hooks {
    before_request: bool,
    after_response: bool,
}

impl Hooks {
    /// No hooks; the plugin is inert.
    pub const NONE: Self = Self {
        before_request: false,
        after_response: false,
    };
    /// Only the before-request hook.
    pub const BEFORE_REQUEST: Self = Self {
        before_request: true,
        after_response: false,
    };
    /// Only the after-response hook.
    pub const AFTER_RESPONSE: Self = Self {
        before_request: false,
        after_response: true,
    };
    /// Both hooks.
    pub const ALL: Self = Self {
        before_request: true,
        after_response: true,
    };

    /// Check if the before-request hook is present.
    pub const fn before_request(self) -> bool {
        self.before_request
    }

    /// Check if the after-response hook is present.
    pub const fn after_response(self) -> bool {
        self.after_response
    }
}

impl BitOr for Hooks {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            before_request: self.before_request || rhs.before_request,
            after_response: self.after_response || rhs.after_response,
        }
    }
}

/// Outcome of a before-request hook.
#[derive(Debug, Clone)]
pub enum BeforeRequest {
    /// Continue with this (possibly modified) request.
    Continue(Request),
    /// Finish the call successfully with this response.
    ///
    /// Remaining before-hooks, the protocol and all after-hooks are skipped.
    Respond(Response),
}

/// A unit of cross-cutting behavior attached to the pipeline.
///
/// Both hooks have pass-through defaults. The pipeline only calls the hooks
/// listed in [`Plugin::hooks`].
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name, used in logs and plugin errors.
    fn name(&self) -> &str;

    /// Hooks this plugin implements.
    fn hooks(&self) -> Hooks;

    /// Disabled plugins are skipped in both phases.
    fn enabled(&self) -> bool {
        true
    }

    /// Inspect or replace the request before dispatch.
    async fn before_request(
        &self,
        request: Request,
        _ctx: &mut PluginContext,
    ) -> Result<BeforeRequest> {
        Ok(BeforeRequest::Continue(request))
    }

    /// Inspect or replace the response after dispatch.
    async fn after_response(&self, response: Response, _ctx: &mut PluginContext) -> Result<Response> {
        Ok(response)
    }
}
