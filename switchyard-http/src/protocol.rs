//! HTTP protocol over `reqwest`.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{
    Body, Capabilities, ClientError, Protocol, ProtocolConfig, Request, Response, Result,
};
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

use crate::HttpConfig;

/// Registry name of the HTTP protocol.
pub const PROTOCOL_NAME: &str = "http";

/// HTTP transport with connection pooling, compression and redirects.
#[derive(Clone)]
pub struct HttpProtocol {
    inner: reqwest::Client,
    config: Arc<HttpConfig>,
    base_url: Option<Url>,
}

impl HttpProtocol {
    /// Create a new HTTP protocol with the given configuration.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| ClientError::configuration(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| ClientError::configuration(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .gzip(config.gzip)
            .brotli(config.brotli)
            .redirect(redirect)
            .build()
            .map_err(|e| ClientError::configuration(format!("failed to build HTTP client: {e}")))?;

        let base_url = config
            .base_url
            .as_deref()
            .map(|url| {
                Url::parse(url)
                    .map_err(|e| ClientError::configuration(format!("invalid base_url '{url}': {e}")))
            })
            .transpose()?;

        Ok(Self {
            inner,
            config: Arc::new(config),
            base_url,
        })
    }

    /// Create a protocol with default configuration.
    pub fn default_protocol() -> Result<Self> {
        Self::new(HttpConfig::default())
    }

    /// Constructor suitable for [`ProtocolRegistry::register_with_config`].
    ///
    /// [`ProtocolRegistry::register_with_config`]: switchyard_core::ProtocolRegistry::register_with_config
    pub fn factory(config: &ProtocolConfig) -> Result<Arc<dyn Protocol>> {
        let config = HttpConfig::from_protocol_config(config)?;
        Ok(Arc::new(Self::new(config)?))
    }

    /// Get the configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Resolve a request target to an absolute URL.
    pub fn build_url(&self, target: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(target) {
            return Ok(url);
        }
        match &self.base_url {
            Some(base) => base.join(target).map_err(|e| {
                ClientError::validation(format!("cannot resolve '{target}' against '{base}': {e}"))
            }),
            None => Err(ClientError::validation(format!(
                "relative target '{target}' requires a base_url"
            ))),
        }
    }

    fn build_request(&self, request: &Request) -> Result<reqwest::RequestBuilder> {
        let mut url = self.build_url(request.target())?;
        if let Some(params) = request.extension("params") {
            append_params(&mut url, params)?;
        }

        let mut builder = self
            .inner
            .request(request.method().clone(), url)
            .headers(request.headers().clone());

        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }
        builder = match request.body() {
            Some(Body::Json(value)) => builder.json(value),
            Some(Body::Bytes(bytes)) => builder.body(bytes.clone()),
            None => builder,
        };
        Ok(builder)
    }
}

impl std::fmt::Debug for HttpProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProtocol")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl Protocol for HttpProtocol {
    fn name(&self) -> &str {
        PROTOCOL_NAME
    }

    fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities::new()
            .with_binary(true)
            .with_compression(self.config.gzip || self.config.brotli);
        if let Some(max) = self.config.max_request_size {
            capabilities = capabilities.with_max_request_size(max);
        }
        capabilities
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let timeout = request.timeout().unwrap_or(self.config.timeout);
        let builder = self.build_request(&request)?;

        debug!(method = %request.method(), target = request.target(), "Sending HTTP request");
        let started = Instant::now();

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        let elapsed = started.elapsed();

        trace!(status, bytes = body.len(), elapsed_ms = elapsed.as_millis() as u64, "Received HTTP response");

        let decoded = decode_json(&headers, &body, status)?;
        let mut response = Response::new(PROTOCOL_NAME, status)
            .with_headers(headers)
            .with_body(body)
            .with_elapsed(elapsed);
        if let Some(decoded) = decoded {
            response = response.with_decoded(decoded);
        }
        response.error_for_status()
    }

    async fn health_check(&self) -> Result<bool> {
        let Some(base) = &self.base_url else {
            return Err(ClientError::configuration(
                "HTTP health check requires a base_url",
            ));
        };
        let url = base.join(&self.config.health_path).map_err(|e| {
            ClientError::configuration(format!("invalid health_path '{}': {e}", self.config.health_path))
        })?;

        match self.inner.get(url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                debug!(error = %e, "HTTP health check failed");
                Ok(false)
            }
        }
    }
}

/// Map a `reqwest` error onto the client error taxonomy.
fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout(timeout)
    } else if error.is_builder() {
        ClientError::validation(format!("invalid HTTP request: {error}"))
    } else if error.is_decode() || error.is_redirect() {
        ClientError::protocol(error.to_string())
    } else {
        ClientError::network(error.to_string())
    }
}

/// Decode a JSON body of a successful response.
fn decode_json(headers: &HeaderMap, body: &Bytes, status: u16) -> Result<Option<Value>> {
    let is_json = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));
    if !is_json || body.is_empty() || !(200..300).contains(&status) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ClientError::protocol(format!("malformed JSON response: {e}")))
}

fn append_params(url: &mut Url, params: &Value) -> Result<()> {
    let Value::Object(params) = params else {
        return Err(ClientError::validation("'params' must be an object"));
    };
    let mut pairs = url.query_pairs_mut();
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::String(s) => {
                pairs.append_pair(key, s);
            }
            Value::Array(items) => {
                for item in items {
                    pairs.append_pair(key, &scalar(item));
                }
            }
            other => {
                pairs.append_pair(key, &scalar(other));
            }
        }
    }
    Ok(())
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn protocol(base: Option<&str>) -> HttpProtocol {
        let mut builder = HttpConfig::builder();
        if let Some(base) = base {
            builder = builder.base_url(base);
        }
        HttpProtocol::new(builder.build()).unwrap()
    }

    #[test]
    fn test_build_url() {
        let http = protocol(Some("https://api.example.com/v1/"));
        assert_eq!(http.build_url("users").unwrap().as_str(), "https://api.example.com/v1/users");
        assert_eq!(
            http.build_url("https://other.example.com/").unwrap().as_str(),
            "https://other.example.com/"
        );
    }

    #[test]
    fn test_relative_target_without_base() {
        let err = protocol(None).build_url("/users").unwrap_err();
        assert_eq!(err.kind(), switchyard_core::ErrorKind::Validation);
    }

    #[test]
    fn test_params_appended() {
        let mut url = Url::parse("https://api.example.com/search?x=1").unwrap();
        append_params(&mut url, &json!({"q": "rust", "page": 2, "tag": ["a", "b"], "skip": null}))
            .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".into(), "rust".into())));
        assert!(pairs.contains(&("page".into(), "2".into())));
        assert!(pairs.contains(&("tag".into(), "b".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "skip"));
    }

    #[test]
    fn test_invalid_default_header() {
        let config = HttpConfig::builder().default_header("bad header", "x").build();
        assert!(HttpProtocol::new(config).is_err());
    }

    #[test]
    fn test_capabilities() {
        let config = HttpConfig::builder().gzip(false).brotli(false).max_request_size(1024).build();
        let caps = HttpProtocol::new(config).unwrap().capabilities();
        assert!(caps.binary);
        assert!(!caps.compression);
        assert_eq!(caps.max_request_size, Some(1024));
    }
}
