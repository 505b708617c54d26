//! Unified client façade.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::{Value, json};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, debug, info_span, warn};
use url::Url;

use crate::cache::{CachePlugin, InMemoryCacheStore};
use crate::config::ClientConfig;
use crate::retry::RetryPolicy;
use crate::{
    ClientError, Pipeline, Plugin, PluginContext, Protocol, ProtocolConfig, ProtocolRegistry,
    Request, RequestOptions, Response, Result,
};

struct ClientInner {
    registry: ProtocolRegistry,
    pipeline: Pipeline,
    retry: RetryPolicy,
    default_protocol: String,
    timeout: Option<Duration>,
    base_url: Option<Url>,
    default_headers: HeaderMap,
}

/// Protocol-agnostic client.
///
/// Every call runs the plugin before-hooks, then the protocol under the
/// retry policy, then the after-hooks, all bounded by the per-call timeout.
/// Cloning is cheap; clones share registry, plugins and cache.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The protocol registry.
    pub fn registry(&self) -> &ProtocolRegistry {
        &self.inner.registry
    }

    /// The plugin pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// The client-wide retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// Protocol used when a call does not name one.
    pub fn default_protocol(&self) -> &str {
        &self.inner.default_protocol
    }

    /// Build a request from `method`, `target` and `options`, then send it.
    pub async fn request(
        &self,
        method: Method,
        target: impl Into<String>,
        options: RequestOptions,
    ) -> Result<Response> {
        self.send(Request::new(method, target), options).await
    }

    /// Send a prebuilt request.
    ///
    /// `request` can be a template reused across calls; options are merged
    /// into a copy.
    pub async fn send(&self, request: Request, options: RequestOptions) -> Result<Response> {
        let name = options
            .protocol
            .as_deref()
            .unwrap_or(&self.inner.default_protocol)
            .to_ascii_lowercase();
        let protocol = self.inner.registry.resolve(&name)?;
        let capabilities = self.inner.registry.capabilities(&name)?;

        let retry = match options.retries {
            Some(retries) => Cow::Owned(
                self.inner
                    .retry
                    .clone()
                    .with_max_attempts(retries.saturating_add(1)),
            ),
            None => Cow::Borrowed(&self.inner.retry),
        };

        let mut request = self.prepare(request, options, &name)?;
        let deadline = request
            .timeout()
            .or(self.inner.timeout)
            .map(|t| capabilities.clamp_timeout(t));
        if let Some(deadline) = deadline {
            request = request.with_timeout(deadline);
        }
        capabilities.check_request(&request)?;
        request.validate()?;

        let span = info_span!(
            "switchyard.request",
            protocol = %name,
            method = %request.method(),
            target = %request.target(),
        );
        let started = Instant::now();

        let call = self.dispatch(protocol, name, request, &retry);
        let result = match deadline {
            Some(deadline) => tokio::time::timeout(deadline, call.instrument(span.clone()))
                .await
                .unwrap_or(Err(ClientError::Timeout(deadline))),
            None => call.instrument(span.clone()).await,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        span.in_scope(|| match &result {
            Ok(response) => debug!(status = response.status(), elapsed_ms, "Request completed"),
            Err(error) => warn!(kind = %error.kind(), error = %error, elapsed_ms, "Request failed"),
        });
        result
    }

    async fn dispatch(
        &self,
        protocol: Arc<dyn Protocol>,
        name: String,
        request: Request,
        retry: &RetryPolicy,
    ) -> Result<Response> {
        let mut ctx = PluginContext::new(name);
        self.inner
            .pipeline
            .execute(request, &mut ctx, |request| async move {
                retry
                    .execute(|attempt| {
                        let protocol = protocol.clone();
                        let request = request.clone();
                        async move {
                            debug!(attempt, "Executing request");
                            protocol.execute(request).await
                        }
                    })
                    .await
            })
            .await
    }

    /// Merge client defaults and call options into `request`.
    ///
    /// A per-call base URL always applies. The client-wide one only applies
    /// to non-empty targets, and only when the protocol was registered
    /// without a base URL of its own.
    fn prepare(&self, request: Request, options: RequestOptions, protocol: &str) -> Result<Request> {
        let mut headers = self.inner.default_headers.clone();
        for (name, value) in request.headers() {
            headers.insert(name.clone(), value.clone());
        }
        let mut request = request.with_headers(&headers);
        for (name, value) in &options.headers {
            request = request.with_header(name, value)?;
        }

        if let Some(body) = options.body {
            request = request.with_body(body);
        }
        if let Some(timeout) = options.timeout {
            request = request.with_timeout(timeout);
        }
        request = request.with_extensions(options.extensions);

        let base_url = match options.base_url.as_deref() {
            Some(url) => Some(Cow::Owned(parse_base_url(url)?)),
            None if request.target().is_empty() => None,
            None => {
                let own_base = self.inner.registry.config(protocol)?.base_url.is_some();
                self.inner.base_url.as_ref().filter(|_| !own_base).map(Cow::Borrowed)
            }
        };
        if let Some(base_url) = base_url {
            let target = resolve_target(&base_url, request.target())?;
            request = request.with_target(target);
        }
        Ok(request)
    }

    /// `GET` request.
    pub async fn get(&self, target: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, target, options).await
    }

    /// `POST` request.
    pub async fn post(&self, target: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, target, options).await
    }

    /// `PUT` request.
    pub async fn put(&self, target: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(Method::PUT, target, options).await
    }

    /// `PATCH` request.
    pub async fn patch(&self, target: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(Method::PATCH, target, options).await
    }

    /// `DELETE` request.
    pub async fn delete(&self, target: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(Method::DELETE, target, options).await
    }

    /// `HEAD` request.
    pub async fn head(&self, target: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(Method::HEAD, target, options).await
    }

    /// `OPTIONS` request.
    pub async fn options(&self, target: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(Method::OPTIONS, target, options).await
    }

    /// Run a GraphQL query or mutation.
    ///
    /// Routed through `"graphql"` unless `options` names another protocol.
    /// The query text and variables travel as request extensions; the
    /// endpoint comes from the protocol or the base URL.
    pub async fn graphql(
        &self,
        query: impl Into<String>,
        variables: Option<Value>,
        mut options: RequestOptions,
    ) -> Result<Response> {
        if options.protocol.is_none() {
            options.protocol = Some("graphql".to_string());
        }
        let mut request = Request::post("").with_extension("query", json!(query.into()));
        if let Some(variables) = variables {
            request = request.with_extension("variables", variables);
        }
        self.send(request, options).await
    }

    /// Probe a protocol. `None` checks the default protocol.
    pub async fn health_check(&self, protocol: Option<&str>) -> Result<bool> {
        let name = protocol.unwrap_or(&self.inner.default_protocol);
        let protocol = self.inner.registry.resolve(name)?;
        let healthy = protocol.health_check().await?;
        debug!(protocol = name, healthy, "Health check");
        Ok(healthy)
    }

    /// Probe every registered protocol concurrently.
    ///
    /// Results are returned in registry name order.
    pub async fn health_check_all(&self) -> Vec<(String, Result<bool>)> {
        let names = self.inner.registry.names();
        let checks = names.iter().map(|name| self.health_check(Some(name.as_str())));
        let results = futures::future::join_all(checks).await;
        names.into_iter().zip(results).collect()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("registry", &self.inner.registry)
            .field("pipeline", &self.inner.pipeline)
            .field("retry", &self.inner.retry)
            .field("default_protocol", &self.inner.default_protocol)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

fn parse_base_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| ClientError::configuration(format!("invalid base_url '{url}': {e}")))
}

/// Resolve `target` against `base`. Absolute targets are kept as-is and an
/// empty target means the base itself.
fn resolve_target(base: &Url, target: &str) -> Result<String> {
    if target.is_empty() {
        return Ok(base.to_string());
    }
    if Url::parse(target).is_ok() {
        return Ok(target.to_string());
    }
    base.join(target)
        .map(String::from)
        .map_err(|e| ClientError::validation(format!("cannot resolve '{target}' against '{base}': {e}")))
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    registry: ProtocolRegistry,
    plugins: Vec<Arc<dyn Plugin>>,
    retry: RetryPolicy,
    default_protocol: String,
    timeout: Option<Duration>,
    base_url: Option<String>,
    default_headers: Vec<(String, String)>,
    error: Option<ClientError>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            registry: ProtocolRegistry::new(),
            plugins: Vec::new(),
            retry: RetryPolicy::default(),
            default_protocol: "http".to_string(),
            timeout: None,
            base_url: None,
            default_headers: Vec::new(),
            error: None,
        }
    }
}

impl ClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol. Registration errors surface from [`build`].
    ///
    /// [`build`]: ClientBuilder::build
    pub fn protocol<F>(self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ProtocolConfig) -> Result<Arc<dyn Protocol>> + Send + Sync + 'static,
    {
        self.protocol_with_config(name, ProtocolConfig::default(), factory)
    }

    /// Register a protocol with its configuration.
    pub fn protocol_with_config<F>(
        mut self,
        name: impl Into<String>,
        config: ProtocolConfig,
        factory: F,
    ) -> Self
    where
        F: Fn(&ProtocolConfig) -> Result<Arc<dyn Protocol>> + Send + Sync + 'static,
    {
        if let Err(e) = self.registry.register_with_config(name, config, factory) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Use a prebuilt registry, replacing any protocols registered so far.
    pub fn registry(mut self, registry: ProtocolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Append a plugin. Plugins run in the order they are added.
    pub fn plugin(self, plugin: impl Plugin + 'static) -> Self {
        self.plugin_arc(Arc::new(plugin))
    }

    /// Append a shared plugin.
    pub fn plugin_arc(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Make exactly one attempt per call.
    pub fn no_retry(self) -> Self {
        self.retry(RetryPolicy::none())
    }

    /// Set the default protocol.
    pub fn default_protocol(mut self, name: impl Into<String>) -> Self {
        self.default_protocol = name.into();
        self
    }

    /// Set the per-call deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the base URL relative targets are resolved against.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a header sent with every call.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Apply client-level settings from a configuration.
    ///
    /// Protocols are not registered here. When the configuration has a
    /// `cache` section an in-memory [`CachePlugin`] is appended.
    pub fn from_config(mut self, config: &ClientConfig) -> Self {
        if let Err(e) = config.validate() {
            self.error.get_or_insert(e);
            return self;
        }

        self.default_protocol = config.default_protocol.clone();
        self.timeout = config.timeout;
        self.base_url = config.base_url.clone();
        self.retry = config.retry.to_policy();
        self.default_headers
            .extend(config.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(cache) = &config.cache {
            match cache.parsed_methods() {
                Ok(methods) => {
                    let plugin = CachePlugin::new(Arc::new(InMemoryCacheStore::new()), cache.ttl())
                        .with_methods(methods);
                    self.plugins.push(Arc::new(plugin));
                }
                Err(e) => {
                    self.error.get_or_insert(e);
                }
            }
        }
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let default_protocol = self.default_protocol.trim().to_ascii_lowercase();
        if !self.registry.contains(&default_protocol) {
            return Err(ClientError::configuration(format!(
                "default protocol '{default_protocol}' is not registered (registered: {})",
                self.registry.names().join(", ")
            )));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ClientError::configuration("timeout must be greater than zero"));
        }

        let base_url = self.base_url.as_deref().map(parse_base_url).transpose()?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| ClientError::configuration(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| ClientError::configuration(format!("invalid value for header '{name}': {e}")))?;
            default_headers.insert(name, value);
        }

        debug!(
            protocols = ?self.registry.names(),
            plugins = self.plugins.len(),
            default_protocol = %default_protocol,
            "Built client"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                registry: self.registry,
                pipeline: Pipeline::new(self.plugins),
                retry: self.retry,
                default_protocol,
                timeout: self.timeout,
                base_url,
                default_headers,
            }),
        })
    }
}
