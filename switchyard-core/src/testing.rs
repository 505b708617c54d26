//! Scripted protocol for tests and benchmarks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::{Capabilities, ClientError, Protocol, Request, Response, Result};

type Responder = Arc<dyn Fn(&Request) -> Result<Response> + Send + Sync>;

#[derive(Default)]
struct Recorded {
    calls: AtomicUsize,
    requests: Mutex<Vec<Request>>,
}

/// A protocol that answers from a script and records what it was sent.
///
/// Scripted outcomes are consumed in order; once the script runs out the
/// fallback responder answers (a `200` echo of the request body unless
/// replaced with [`StubProtocol::always`]). Clones share their recordings.
///
/// ```
/// use switchyard_core::testing::StubProtocol;
/// use switchyard_core::{ClientError, Response};
///
/// let stub = StubProtocol::new("http")
///     .with_responses(vec![Err(ClientError::status(503, "busy"))])
///     .always(|_| Ok(Response::new("http", 200)));
/// assert_eq!(stub.calls(), 0);
/// ```
#[derive(Clone)]
pub struct StubProtocol {
    name: String,
    capabilities: Capabilities,
    script: Arc<Mutex<VecDeque<Result<Response>>>>,
    fallback: Responder,
    latency: Option<Duration>,
    healthy: Arc<AtomicBool>,
    recorded: Arc<Recorded>,
}

impl StubProtocol {
    /// Create a stub that answers every request with `200`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let echo_name = name.clone();
        Self {
            name,
            capabilities: Capabilities::new().with_binary(true),
            script: Arc::default(),
            fallback: Arc::new(move |request: &Request| -> Result<Response> {
                let body = match request.body() {
                    Some(body) => body.to_bytes()?,
                    None => Default::default(),
                };
                Ok(Response::new(echo_name.clone(), 200).with_body(body))
            }),
            latency: None,
            healthy: Arc::new(AtomicBool::new(true)),
            recorded: Arc::default(),
        }
    }

    /// Report these capabilities.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Queue outcomes returned before the fallback takes over.
    pub fn with_responses(self, outcomes: Vec<Result<Response>>) -> Self {
        self.script.lock().extend(outcomes);
        self
    }

    /// Answer every unscripted request with `f`.
    pub fn always<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Result<Response> + Send + Sync + 'static,
    {
        self.fallback = Arc::new(f);
        self
    }

    /// Sleep this long inside every `execute`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Set what `health_check` reports.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `execute` calls so far.
    pub fn calls(&self) -> usize {
        self.recorded.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.recorded.requests.lock().clone()
    }

    /// The latest request received.
    pub fn last_request(&self) -> Option<Request> {
        self.recorded.requests.lock().last().cloned()
    }

    /// Box as a shared protocol handle.
    pub fn into_protocol(self) -> Arc<dyn Protocol> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for StubProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubProtocol")
            .field("name", &self.name)
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl Protocol for StubProtocol {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        self.recorded.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.requests.lock().push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => (self.fallback)(&request),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.healthy.load(Ordering::SeqCst))
    }
}

/// Fail every call with `error`.
pub fn failing(name: impl Into<String>, error: ClientError) -> StubProtocol {
    StubProtocol::new(name).always(move |_| Err(error.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let stub = StubProtocol::new("stub")
            .with_responses(vec![Err(ClientError::network("reset"))]);

        assert!(stub.execute(Request::get("/a")).await.is_err());
        let response = stub
            .execute(Request::post("/b").with_body("hi"))
            .await
            .unwrap();

        assert_eq!(response.text().unwrap(), "hi");
        assert_eq!(stub.calls(), 2);
        assert_eq!(stub.requests()[0].target(), "/a");
        assert_eq!(stub.last_request().unwrap().target(), "/b");
    }

    #[tokio::test]
    async fn test_clones_share_recordings() {
        let stub = failing("stub", ClientError::status(503, "busy"));
        let handle = stub.clone().into_protocol();

        let err = handle.execute(Request::get("/")).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(stub.calls(), 1);

        stub.set_healthy(false);
        assert!(!handle.health_check().await.unwrap());
    }
}
