//! GraphQL over HTTP POST.

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{
    Capabilities, ClientError, Protocol, ProtocolConfig, Request, Response, Result,
};
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

use crate::{GraphQLRequest, GraphQLResponse, GraphqlConfig};

/// Registry name of the GraphQL protocol.
pub const PROTOCOL_NAME: &str = "graphql";

const HEALTH_QUERY: &str = "{ __typename }";

/// GraphQL transport.
///
/// Every call is a `POST` of a JSON payload to the configured endpoint. A
/// non-empty request target overrides the endpoint (absolute) or is resolved
/// against it (relative).
#[derive(Clone)]
pub struct GraphqlProtocol {
    inner: reqwest::Client,
    config: Arc<GraphqlConfig>,
    endpoint: Option<Url>,
}

impl GraphqlProtocol {
    /// Create a new GraphQL protocol.
    pub fn new(config: GraphqlConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| ClientError::configuration(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| ClientError::configuration(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .gzip(config.gzip)
            .build()
            .map_err(|e| ClientError::configuration(format!("failed to build GraphQL client: {e}")))?;

        let endpoint = config
            .endpoint
            .as_deref()
            .map(|url| {
                Url::parse(url)
                    .map_err(|e| ClientError::configuration(format!("invalid endpoint '{url}': {e}")))
            })
            .transpose()?;

        Ok(Self {
            inner,
            config: Arc::new(config),
            endpoint,
        })
    }

    /// Constructor suitable for [`ProtocolRegistry::register_with_config`].
    ///
    /// [`ProtocolRegistry::register_with_config`]: switchyard_core::ProtocolRegistry::register_with_config
    pub fn factory(config: &ProtocolConfig) -> Result<Arc<dyn Protocol>> {
        let config = GraphqlConfig::from_protocol_config(config)?;
        Ok(Arc::new(Self::new(config)?))
    }

    /// Get the configuration.
    pub fn config(&self) -> &GraphqlConfig {
        &self.config
    }

    /// Resolve the URL a request is posted to.
    pub fn resolve_endpoint(&self, target: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(target) {
            return Ok(url);
        }
        let Some(endpoint) = &self.endpoint else {
            return Err(ClientError::validation(
                "GraphQL request has no endpoint: configure one or pass an absolute target",
            ));
        };
        if target.is_empty() {
            return Ok(endpoint.clone());
        }
        endpoint.join(target).map_err(|e| {
            ClientError::validation(format!("cannot resolve '{target}' against '{endpoint}': {e}"))
        })
    }

    async fn post(
        &self,
        url: Url,
        payload: &GraphQLRequest,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<(u16, HeaderMap, bytes::Bytes)> {
        let response = self
            .inner
            .post(url)
            .headers(headers)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        Ok((status, headers, body))
    }
}

impl std::fmt::Debug for GraphqlProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlProtocol")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl Protocol for GraphqlProtocol {
    fn name(&self) -> &str {
        PROTOCOL_NAME
    }

    fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities::new().with_compression(self.config.gzip);
        if let Some(max) = self.config.max_request_size {
            capabilities = capabilities.with_max_request_size(max);
        }
        capabilities
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let payload = GraphQLRequest::from_request(&request)?;
        let url = self.resolve_endpoint(request.target())?;
        let timeout = request.timeout().unwrap_or(self.config.timeout);

        debug!(
            endpoint = %url,
            operation = payload.operation_name.as_deref().unwrap_or("anonymous"),
            "Sending GraphQL request"
        );
        let started = Instant::now();
        let (status, headers, body) = self
            .post(url, &payload, request.headers().clone(), timeout)
            .await?;
        let elapsed = started.elapsed();
        trace!(status, bytes = body.len(), elapsed_ms = elapsed.as_millis() as u64, "Received GraphQL response");

        let response = Response::new(PROTOCOL_NAME, status)
            .with_headers(headers)
            .with_body(body.clone())
            .with_elapsed(elapsed);

        if !response.is_success() {
            // Servers often describe the failure in a GraphQL error list.
            if let Ok(parsed) = serde_json::from_slice::<GraphQLResponse>(&body)
                && let Some(message) = parsed.error_message()
            {
                return Err(ClientError::status(status, message));
            }
            return response.error_for_status();
        }

        let parsed: GraphQLResponse<Value> = serde_json::from_slice(&body)
            .map_err(|e| ClientError::protocol(format!("malformed GraphQL response: {e}")))?;
        if let Some(message) = parsed.error_message() {
            return Err(ClientError::protocol(message));
        }
        match parsed.data {
            Some(Value::Null) | None => Err(ClientError::protocol(
                "GraphQL response contained no data",
            )),
            Some(data) => Ok(response.with_decoded(data)),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let Some(endpoint) = &self.endpoint else {
            return Err(ClientError::configuration(
                "GraphQL health check requires an endpoint",
            ));
        };

        let probe = GraphQLRequest::new(HEALTH_QUERY);
        match self
            .post(endpoint.clone(), &probe, HeaderMap::new(), self.config.timeout)
            .await
        {
            Ok((status, _, body)) => {
                let healthy = (200..300).contains(&status)
                    && serde_json::from_slice::<GraphQLResponse>(&body)
                        .is_ok_and(|r| !r.has_errors() && r.data.is_some());
                Ok(healthy)
            }
            Err(e) => {
                debug!(error = %e, "GraphQL health check failed");
                Ok(false)
            }
        }
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout(timeout)
    } else if error.is_builder() {
        ClientError::validation(format!("invalid GraphQL request: {error}"))
    } else if error.is_decode() {
        ClientError::protocol(error.to_string())
    } else {
        ClientError::network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_endpoint() {
        let graphql = GraphqlProtocol::new(GraphqlConfig::new("https://api.example.com/graphql")).unwrap();
        assert_eq!(
            graphql.resolve_endpoint("").unwrap().as_str(),
            "https://api.example.com/graphql"
        );
        assert_eq!(
            graphql.resolve_endpoint("admin").unwrap().as_str(),
            "https://api.example.com/admin"
        );
        assert_eq!(
            graphql.resolve_endpoint("https://other.example.com/gql").unwrap().as_str(),
            "https://other.example.com/gql"
        );
    }

    #[test]
    fn test_no_endpoint() {
        let graphql = GraphqlProtocol::new(GraphqlConfig::default()).unwrap();
        assert_eq!(
            graphql.resolve_endpoint("").unwrap_err().kind(),
            switchyard_core::ErrorKind::Validation
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(GraphqlProtocol::new(GraphqlConfig::new("not a url")).is_err());
    }

    #[test]
    fn test_capabilities() {
        let config = GraphqlConfig::new("https://api.example.com/graphql").with_max_request_size(2048);
        let caps = GraphqlProtocol::new(config).unwrap().capabilities();
        assert!(!caps.binary);
        assert!(caps.compression);
        assert_eq!(caps.max_request_size, Some(2048));
    }
}
