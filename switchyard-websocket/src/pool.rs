//! Idle connection pool.

use http::HeaderMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// An open client connection.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Identity of a pooled connection: the URL plus every header sent during
/// the handshake.
///
/// Headers only travel with the handshake, so two calls may share a
/// connection only when they would have opened it identically.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    url: String,
    headers: Vec<(String, Vec<u8>)>,
}

impl PoolKey {
    /// Key for a connection to `url` opened with `headers`.
    pub fn new(url: impl Into<String>, headers: &HeaderMap) -> Self {
        let mut headers: Vec<(String, Vec<u8>)> = headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();
        headers.sort();
        Self {
            url: url.into(),
            headers,
        }
    }

    /// The connection URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

// Header values may carry credentials.
impl std::fmt::Debug for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolKey")
            .field("url", &self.url)
            .field("headers", &self.headers.len())
            .finish()
    }
}

/// Idle connections keyed by [`PoolKey`].
///
/// A connection leaves the pool on checkout and only comes back through
/// [`checkin`](Self::checkin) after a complete exchange. Dropping it instead
/// closes the socket.
pub struct ConnectionPool {
    idle: Mutex<HashMap<PoolKey, Vec<WsStream>>>,
    max_idle_per_url: usize,
}

impl ConnectionPool {
    /// Create a pool keeping at most `max_idle_per_url` connections per key.
    pub fn new(max_idle_per_url: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            max_idle_per_url,
        }
    }

    /// Take an idle connection opened under `key`.
    pub fn checkout(&self, key: &PoolKey) -> Option<WsStream> {
        let mut idle = self.idle.lock();
        let connections = idle.get_mut(key)?;
        let stream = connections.pop();
        if connections.is_empty() {
            idle.remove(key);
        }
        stream
    }

    /// Return a connection. Returns `false` if the pool for `key` is full and
    /// the connection was dropped.
    pub fn checkin(&self, key: &PoolKey, stream: WsStream) -> bool {
        let mut idle = self.idle.lock();
        let connections = idle.entry(key.clone()).or_default();
        if connections.len() >= self.max_idle_per_url {
            return false;
        }
        connections.push(stream);
        true
    }

    /// Number of idle connections to `url`, across all header sets.
    pub fn idle_count(&self, url: &str) -> usize {
        self.idle
            .lock()
            .iter()
            .filter(|(key, _)| key.url == url)
            .map(|(_, connections)| connections.len())
            .sum()
    }

    /// Drop every idle connection.
    pub fn clear(&self) {
        self.idle.lock().clear();
    }

    /// Per-key cap.
    pub fn max_idle_per_url(&self) -> usize {
        self.max_idle_per_url
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let idle = self.idle.lock();
        f.debug_struct("ConnectionPool")
            .field("urls", &idle.len())
            .field("idle", &idle.values().map(Vec::len).sum::<usize>())
            .field("max_idle_per_url", &self.max_idle_per_url)
            .finish()
    }
}
