//! End-to-end behavior of the client pipeline against scripted protocols.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::cache::{CachePlugin, CacheStore, InMemoryCacheStore};
use switchyard_core::testing::{StubProtocol, failing};
use switchyard_core::{
    BeforeRequest, Client, ClientError, ErrorKind, Hooks, Plugin, PluginContext, Request,
    RequestOptions, Response, Result, RetryPolicy,
};
use tokio::time::Instant;

fn client(stub: &StubProtocol, build: impl FnOnce(switchyard_core::ClientBuilder) -> switchyard_core::ClientBuilder) -> Client {
    let stub = stub.clone();
    build(Client::builder().protocol("http", move |_| Ok(stub.clone().into_protocol())))
        .build()
        .unwrap()
}

struct Tag {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl Plugin for Tag {
    fn name(&self) -> &str {
        self.name
    }

    fn hooks(&self) -> Hooks {
        Hooks::ALL
    }

    async fn before_request(&self, request: Request, _ctx: &mut PluginContext) -> Result<BeforeRequest> {
        self.log.lock().push(format!("{}:before", self.name));
        if self.fail {
            return Err(ClientError::plugin(self.name, "denied"));
        }
        Ok(BeforeRequest::Continue(request))
    }

    async fn after_response(&self, response: Response, _ctx: &mut PluginContext) -> Result<Response> {
        self.log.lock().push(format!("{}:after", self.name));
        Ok(response)
    }
}

struct SetCacheKey(&'static str);

#[async_trait]
impl Plugin for SetCacheKey {
    fn name(&self) -> &str {
        "set-cache-key"
    }

    fn hooks(&self) -> Hooks {
        Hooks::BEFORE_REQUEST
    }

    async fn before_request(&self, request: Request, _ctx: &mut PluginContext) -> Result<BeforeRequest> {
        Ok(BeforeRequest::Continue(request.with_header("X-Cache-Key", self.0)?))
    }
}

#[test]
fn test_result_laws() {
    let f = |x: i32| -> Result<i32> { Ok(x + 1) };
    let g = |x: i32| -> Result<i32> {
        if x > 10 {
            Err(ClientError::validation("too big"))
        } else {
            Ok(x * 2)
        }
    };

    // Left identity.
    assert_eq!(Ok::<_, ClientError>(3).and_then(f).unwrap(), f(3).unwrap());

    // Associativity.
    for m in [Ok(2), Ok(20), Err(ClientError::network("down"))] {
        let left = m.clone().and_then(f).and_then(g);
        let right = m.and_then(|x| f(x).and_then(g));
        assert_eq!(left.as_ref().ok(), right.as_ref().ok());
        assert_eq!(left.err().map(|e| e.kind()), right.err().map(|e| e.kind()));
    }

    // Failures pass map untouched and are recoverable with unwrap_or.
    let failed: Result<i32> = Err(ClientError::status(503, "busy"));
    let mapped = failed.clone().map(|x| x + 1);
    assert_eq!(mapped.unwrap_err().status_code(), Some(503));
    assert_eq!(failed.unwrap_or(0), 0);
}

#[tokio::test]
async fn test_unknown_protocol_is_configuration_error() {
    let stub = StubProtocol::new("http");
    let client = client(&stub, |b| b);

    let err = client
        .get("/", RequestOptions::new().protocol("grpc"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.message().contains("grpc"));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_before_hook_failure_stops_later_plugins_and_protocol() {
    let stub = StubProtocol::new("http");
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = client(&stub, |b| {
        b.plugin(Tag {
            name: "a",
            log: log.clone(),
            fail: true,
        })
        .plugin(Tag {
            name: "b",
            log: log.clone(),
            fail: false,
        })
    });

    let err = client.get("/", RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Plugin);
    assert_eq!(*log.lock(), vec!["a:before"]);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_after_hooks_run_in_registration_order() {
    let stub = StubProtocol::new("http");
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = client(&stub, |b| {
        b.plugin(Tag {
            name: "a",
            log: log.clone(),
            fail: false,
        })
        .plugin(Tag {
            name: "b",
            log: log.clone(),
            fail: false,
        })
    });

    client.get("/", RequestOptions::new()).await.unwrap();
    assert_eq!(*log.lock(), vec!["a:before", "b:before", "a:after", "b:after"]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_is_exact_and_backs_off() {
    let stub = failing("http", ClientError::status(503, "Service Unavailable"));
    let client = client(&stub, |b| {
        b.retry(RetryPolicy::exponential(3, Duration::from_millis(10), 2.0))
    });

    let started = Instant::now();
    let err = client.get("/", RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.status_code(), Some(503));
    assert_eq!(stub.calls(), 3);
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cancels_backoff_sleep() {
    let stub = failing("http", ClientError::status(503, "Service Unavailable"));
    let client = client(&stub, |b| b.retry(RetryPolicy::constant(5, Duration::from_secs(10))));

    let started = Instant::now();
    let err = client
        .get("/", RequestOptions::new().timeout(Duration::from_secs(1)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(stub.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_failure_surfaces_after_one_attempt() {
    let stub = failing("http", ClientError::status(404, "Not Found"));
    let client = client(&stub, |b| b.retry(RetryPolicy::immediate(5)));

    let err = client.get("/", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(stub.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_after_transient_failures() {
    let stub = StubProtocol::new("http").with_responses(vec![
        Err(ClientError::network("connection reset")),
        Err(ClientError::status(502, "Bad Gateway")),
    ]);
    let client = client(&stub, |b| b.retry(RetryPolicy::exponential(3, Duration::from_millis(5), 2.0)));

    let response = client.get("/", RequestOptions::new()).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(stub.calls(), 3);
}

#[tokio::test]
async fn test_cache_key_header_from_earlier_plugin_is_used() {
    let stub = StubProtocol::new("http");
    let store = Arc::new(InMemoryCacheStore::new());
    let cached = Response::new("http", 200).with_body("from cache");
    store
        .set("abc", cached.clone(), Duration::from_secs(60))
        .await
        .unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let client = client(&stub, |b| {
        b.plugin(SetCacheKey("abc"))
            .plugin(CachePlugin::new(store.clone(), Duration::from_secs(60)))
            .plugin(Tag {
                name: "after-cache",
                log: log.clone(),
                fail: false,
            })
    });

    let response = client.get("/anything", RequestOptions::new()).await.unwrap();

    assert_eq!(response, cached);
    assert_eq!(stub.calls(), 0);
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_cache_key_header_is_not_sent_on_miss() {
    let stub = StubProtocol::new("http");
    let store = Arc::new(InMemoryCacheStore::new());
    let client = client(&stub, |b| {
        b.plugin(SetCacheKey("users-page-1"))
            .plugin(CachePlugin::new(store.clone(), Duration::from_secs(60)))
    });

    client.get("/users", RequestOptions::new()).await.unwrap();

    assert_eq!(stub.last_request().unwrap().header("x-cache-key"), None);
    assert!(store.get("users-page-1").await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_cache_round_trip_honors_ttl() {
    let stub = StubProtocol::new("http");
    let store = Arc::new(InMemoryCacheStore::new());
    let client = client(&stub, |b| {
        b.plugin(CachePlugin::new(store.clone(), Duration::from_secs(30)))
    });

    let first = client.get("/users", RequestOptions::new()).await.unwrap();
    let second = client.get("/users", RequestOptions::new()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(stub.calls(), 1);
    assert_eq!(store.len().await.unwrap(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(store.get("http:GET /users").await.unwrap(), None);

    client.get("/users", RequestOptions::new()).await.unwrap();
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn test_failures_are_never_cached() {
    let stub = StubProtocol::new("http").with_responses(vec![Err(ClientError::status(500, "boom"))]);
    let store = Arc::new(InMemoryCacheStore::new());
    let client = client(&stub, |b| {
        b.no_retry()
            .plugin(CachePlugin::new(store.clone(), Duration::from_secs(30)))
    });

    client.get("/users", RequestOptions::new()).await.unwrap_err();
    assert_eq!(store.len().await.unwrap(), 0);

    client.get("/users", RequestOptions::new()).await.unwrap();
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn test_every_outcome_has_exactly_one_kind() {
    let outcomes = vec![
        Ok(Response::new("http", 204)),
        Err(ClientError::network("refused")),
        Err(ClientError::Timeout(Duration::from_millis(5))),
        Err(ClientError::status(418, "teapot")),
        Err(ClientError::validation("bad")),
        Err(ClientError::configuration("missing")),
        Err(ClientError::plugin("auth", "denied").context("calling /me")),
    ];
    let expected = outcomes.len();
    let stub = StubProtocol::new("http").with_responses(outcomes);
    let client = client(&stub, |b| b.no_retry());

    let mut kinds = Vec::new();
    for _ in 0..expected {
        match client.get("/", RequestOptions::new()).await {
            Ok(response) => assert_eq!(response.status(), 204),
            Err(error) => kinds.push(error.kind()),
        }
    }
    assert_eq!(
        kinds,
        vec![
            ErrorKind::Network,
            ErrorKind::Timeout,
            ErrorKind::Protocol,
            ErrorKind::Validation,
            ErrorKind::Configuration,
            ErrorKind::Plugin,
        ]
    );
}
