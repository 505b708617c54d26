//! Request/reply transport over WebSocket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use switchyard_core::{
    Capabilities, ClientError, Protocol, ProtocolConfig, Request, Response, Result,
};
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as TungsteniteMessage, client::IntoClientRequest};
use tracing::{debug, trace};
use url::Url;

use crate::pool::{ConnectionPool, PoolKey, WsStream};
use crate::{Message, WebSocketConfig};

/// Registry name of the WebSocket protocol.
pub const PROTOCOL_NAME: &str = "websocket";

/// Status reported on every successful exchange (switching protocols).
pub const SWITCHING_PROTOCOLS: u16 = 101;

/// WebSocket transport.
///
/// Each call sends the request body as one message and resolves with the
/// first data message the peer sends back. Connections are pooled per URL
/// and handshake header set, and reused across calls.
#[derive(Clone)]
pub struct WebSocketProtocol {
    config: Arc<WebSocketConfig>,
    base_url: Option<Url>,
    headers: HeaderMap,
    pool: Arc<ConnectionPool>,
}

impl WebSocketProtocol {
    /// Create a new WebSocket protocol.
    pub fn new(config: WebSocketConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| ClientError::configuration(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| ClientError::configuration(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let base_url = config
            .base_url
            .as_deref()
            .map(|url| {
                let parsed = Url::parse(url)
                    .map_err(|e| ClientError::configuration(format!("invalid base_url '{url}': {e}")))?;
                check_scheme(&parsed).map_err(|_| {
                    ClientError::configuration(format!("base_url '{url}' must use ws or wss"))
                })?;
                Ok(parsed)
            })
            .transpose()?;

        Ok(Self {
            pool: Arc::new(ConnectionPool::new(config.max_idle_per_url)),
            config: Arc::new(config),
            base_url,
            headers,
        })
    }

    /// Constructor suitable for [`ProtocolRegistry::register_with_config`].
    ///
    /// [`ProtocolRegistry::register_with_config`]: switchyard_core::ProtocolRegistry::register_with_config
    pub fn factory(config: &ProtocolConfig) -> Result<Arc<dyn Protocol>> {
        let config = WebSocketConfig::from_protocol_config(config)?;
        Ok(Arc::new(Self::new(config)?))
    }

    /// Get the configuration.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Get the idle connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Resolve a request target to a `ws://` or `wss://` URL.
    pub fn resolve_url(&self, target: &str) -> Result<Url> {
        let url = match Url::parse(target) {
            Ok(url) => url,
            Err(_) => match &self.base_url {
                Some(base) => base.join(target).map_err(|e| {
                    ClientError::validation(format!("cannot resolve '{target}' against '{base}': {e}"))
                })?,
                None => {
                    return Err(ClientError::validation(format!(
                        "relative target '{target}' requires a base_url"
                    )));
                }
            },
        };
        check_scheme(&url)?;
        Ok(url)
    }

    /// Configured headers overlaid with the request's own.
    fn handshake_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let mut merged = self.headers.clone();
        for (name, value) in headers {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    async fn connect(&self, url: &Url, headers: &HeaderMap) -> Result<WsStream> {
        let mut handshake = url.as_str().into_client_request().map_err(map_ws_error)?;
        for (name, value) in headers {
            handshake.headers_mut().insert(name.clone(), value.clone());
        }

        let timeout = self.config.connect_timeout;
        let (stream, response) = tokio::time::timeout(timeout, connect_async(handshake))
            .await
            .map_err(|_| ClientError::Timeout(timeout))?
            .map_err(map_ws_error)?;

        debug!(url = %url, status = response.status().as_u16(), "WebSocket connected");
        Ok(stream)
    }

    async fn round_trip(&self, url: &Url, headers: &HeaderMap, message: Message) -> Result<Message> {
        let headers = self.handshake_headers(headers);
        let key = PoolKey::new(url.as_str(), &headers);

        if let Some(mut stream) = self.pool.checkout(&key) {
            match exchange(&mut stream, message.clone(), self.config.max_message_size).await {
                Ok(reply) => {
                    self.release(&key, stream);
                    return Ok(reply);
                }
                // The peer may have dropped an idle connection.
                Err(e) if e.is_network() => {
                    debug!(url = key.url(), error = %e, "Discarding stale WebSocket connection");
                }
                Err(e) => return Err(e),
            }
        }

        let mut stream = self.connect(url, &headers).await?;
        let reply = exchange(&mut stream, message, self.config.max_message_size).await?;
        self.release(&key, stream);
        Ok(reply)
    }

    fn release(&self, key: &PoolKey, stream: WsStream) {
        if !self.pool.checkin(key, stream) {
            trace!(url = key.url(), "WebSocket pool full, closing connection");
        }
    }
}

impl std::fmt::Debug for WebSocketProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketProtocol")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}

#[async_trait]
impl Protocol for WebSocketProtocol {
    fn name(&self) -> &str {
        PROTOCOL_NAME
    }

    fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities::new().with_binary(true);
        if let Some(max) = self.config.max_message_size {
            capabilities = capabilities.with_max_request_size(max);
        }
        capabilities
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let url = self.resolve_url(request.target())?;
        let body = request
            .body()
            .ok_or_else(|| ClientError::validation("WebSocket request requires a body"))?;
        let message = Message::from_body(body)?;
        if let Some(max) = self.config.max_message_size
            && message.len() > max
        {
            return Err(ClientError::validation(format!(
                "message of {} bytes exceeds the limit of {max} bytes",
                message.len()
            )));
        }

        let timeout = request.timeout().unwrap_or(self.config.timeout);
        debug!(url = %url, bytes = message.len(), "Sending WebSocket message");
        let started = Instant::now();

        let reply = tokio::time::timeout(timeout, self.round_trip(&url, request.headers(), message))
            .await
            .map_err(|_| ClientError::Timeout(timeout))??;
        let elapsed = started.elapsed();
        trace!(bytes = reply.len(), elapsed_ms = elapsed.as_millis() as u64, "Received WebSocket reply");

        let decoded = reply.json_value();
        let mut response = Response::new(PROTOCOL_NAME, SWITCHING_PROTOCOLS)
            .with_body(reply.payload)
            .with_elapsed(elapsed);
        if let Some(decoded) = decoded {
            response = response.with_decoded(decoded);
        }
        Ok(response)
    }

    async fn health_check(&self) -> Result<bool> {
        let Some(base) = &self.base_url else {
            return Err(ClientError::configuration(
                "WebSocket health check requires a base_url",
            ));
        };

        match self.connect(base, &self.headers).await {
            Ok(mut stream) => {
                let _ = stream.close(None).await;
                Ok(true)
            }
            Err(e) => {
                debug!(error = %e, "WebSocket health check failed");
                Ok(false)
            }
        }
    }
}

/// Send one message and wait for the first data message in reply.
async fn exchange(stream: &mut WsStream, message: Message, max_size: Option<usize>) -> Result<Message> {
    stream
        .send(TungsteniteMessage::from(message))
        .await
        .map_err(map_ws_error)?;

    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(map_ws_error)?;
        if let TungsteniteMessage::Close(close) = &frame {
            let reason = close
                .as_ref()
                .map(|c| c.reason.to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "no reason given".to_string());
            return Err(ClientError::network(format!(
                "WebSocket closed by peer before reply: {reason}"
            )));
        }
        if let Some(reply) = Message::from_frame(frame) {
            if let Some(max) = max_size
                && reply.len() > max
            {
                return Err(ClientError::protocol(format!(
                    "reply of {} bytes exceeds the limit of {max} bytes",
                    reply.len()
                )));
            }
            return Ok(reply);
        }
    }
    Err(ClientError::network("WebSocket connection ended before reply"))
}

fn check_scheme(url: &Url) -> Result<()> {
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ClientError::validation(format!(
            "unsupported WebSocket scheme '{other}', expected ws or wss"
        ))),
    }
}

fn map_ws_error(error: tungstenite::Error) -> ClientError {
    use tungstenite::Error;

    match error {
        Error::ConnectionClosed | Error::AlreadyClosed => {
            ClientError::network("WebSocket connection closed")
        }
        Error::Io(e) => ClientError::network(format!("WebSocket I/O error: {e}")),
        Error::Url(e) => ClientError::validation(format!("invalid WebSocket URL: {e}")),
        Error::Http(response) => ClientError::status(
            response.status().as_u16(),
            "WebSocket handshake rejected",
        ),
        other => ClientError::protocol(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::ErrorKind;

    #[test]
    fn test_resolve_url() {
        let ws = WebSocketProtocol::new(WebSocketConfig::new("ws://localhost:9000/api/")).unwrap();
        assert_eq!(ws.resolve_url("echo").unwrap().as_str(), "ws://localhost:9000/api/echo");
        assert_eq!(
            ws.resolve_url("wss://other.example.com/feed").unwrap().as_str(),
            "wss://other.example.com/feed"
        );
        assert_eq!(
            ws.resolve_url("https://example.com/").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_http_base_url_rejected() {
        let err = WebSocketProtocol::new(WebSocketConfig::new("http://localhost")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_capabilities() {
        let ws = WebSocketProtocol::new(WebSocketConfig::default().with_max_message_size(512)).unwrap();
        let caps = ws.capabilities();
        assert!(caps.binary);
        assert!(!caps.compression);
        assert_eq!(caps.max_request_size, Some(512));
    }
}
