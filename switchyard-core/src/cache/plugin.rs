//! Cache plugin.

use async_trait::async_trait;
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::CacheStore;
use crate::{BeforeRequest, Hooks, Plugin, PluginContext, Request, Response, Result};

/// Header a caller (or an earlier plugin) sets to choose the cache key.
pub const CACHE_KEY_HEADER: &str = "x-cache-key";

/// Context key holding the cache key of a missed lookup.
pub const CACHE_KEY_CONTEXT: &str = "cache.key";

/// Serves cached responses and stores successful ones.
///
/// On a hit the before-hook answers the call directly, so the protocol and
/// every after-hook are skipped. On a miss the key is remembered in the
/// plugin context and the after-hook stores the response under it.
pub struct CachePlugin {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    methods: Vec<Method>,
    enabled: bool,
}

impl CachePlugin {
    /// Create a cache plugin caching `GET` and `HEAD` for `ttl`.
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            methods: vec![Method::GET, Method::HEAD],
            enabled: true,
        }
    }

    /// Replace the cacheable methods.
    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    /// Enable or disable the plugin.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Entry time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Compute the cache key for a request.
    ///
    /// An `X-Cache-Key` header wins. Otherwise the key is built from the
    /// protocol, method, target and any extensions.
    pub fn cache_key(&self, protocol: &str, request: &Request) -> String {
        if let Some(key) = request.header(CACHE_KEY_HEADER) {
            return key.to_string();
        }
        let mut key = format!("{}:{} {}", protocol, request.method(), request.target());
        if !request.extensions().is_empty() {
            // serde_json::Map is ordered by key, so this is stable.
            key.push(' ');
            key.push_str(&serde_json::Value::Object(request.extensions().clone()).to_string());
        }
        key
    }

    fn is_cacheable(&self, request: &Request) -> bool {
        self.methods.contains(request.method())
    }
}

impl std::fmt::Debug for CachePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePlugin")
            .field("ttl", &self.ttl)
            .field("methods", &self.methods)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[async_trait]
impl Plugin for CachePlugin {
    fn name(&self) -> &str {
        "cache"
    }

    fn hooks(&self) -> Hooks {
        Hooks::ALL
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn before_request(&self, request: Request, ctx: &mut PluginContext) -> Result<BeforeRequest> {
        if !self.is_cacheable(&request) {
            return Ok(BeforeRequest::Continue(request.without_header(CACHE_KEY_HEADER)));
        }

        // The key header is local to the client and never reaches the peer.
        let key = self.cache_key(ctx.protocol(), &request);
        let request = request.without_header(CACHE_KEY_HEADER);
        if let Some(response) = self.store.get(&key).await? {
            debug!(key = %key, "Cache hit");
            return Ok(BeforeRequest::Respond(response));
        }

        debug!(key = %key, "Cache miss");
        ctx.insert(CACHE_KEY_CONTEXT, key);
        Ok(BeforeRequest::Continue(request))
    }

    async fn after_response(&self, response: Response, ctx: &mut PluginContext) -> Result<Response> {
        if let Some(key) = ctx.get::<String>(CACHE_KEY_CONTEXT)
            && response.is_success()
        {
            self.store.set(key, response.clone(), self.ttl).await?;
        }
        Ok(response)
    }
}
