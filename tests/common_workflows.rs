//! Integration tests for common Switchyard workflows.
//!
//! These tests drive the façade crate the way an application would: load a
//! configuration, build a client from it and call real transports.

use serde_json::json;
use std::sync::Arc;
use switchyard::plugins::REQUEST_ID_HEADER;
use switchyard::prelude::*;
use switchyard::testing::StubProtocol;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_default_registry_has_builtin_transports() {
    let registry = switchyard::default_registry(&ClientConfig::default()).unwrap();

    assert_eq!(registry.names(), vec!["graphql", "http", "websocket"]);
    assert!(registry.capabilities("http").unwrap().binary);
    assert!(!registry.capabilities("graphql").unwrap().binary);

    let err = registry.resolve("grpc").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_bad_protocol_settings_fail_at_registration() {
    let config = ClientConfig::from_toml_str(
        r#"
        [protocols.websocket]
        base_url = "http://not-a-websocket"
        "#,
    )
    .unwrap();

    let err = switchyard::default_registry(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_unknown_default_protocol_rejected() {
    let config = ClientConfig::from_toml_str(r#"default_protocol = "carrier-pigeon""#).unwrap();
    let err = switchyard::client_builder(&config).unwrap().build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

// =============================================================================
// Configured HTTP client
// =============================================================================

#[tokio::test]
async fn test_configured_client_caches_get_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog"))
        .and(header("x-team", "storefront"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::from_toml_str(&format!(
        r#"
        default_protocol = "http"
        timeout = 5.0

        [headers]
        x-team = "storefront"

        [cache]
        ttl_secs = 60

        [protocols.http]
        base_url = "{}"
        "#,
        server.uri()
    ))
    .unwrap();

    let client = switchyard::client_builder(&config).unwrap().build().unwrap();

    let first = client.get("/catalog", RequestOptions::new()).await.unwrap();
    let second = client.get("/catalog", RequestOptions::new()).await.unwrap();

    assert_eq!(first.decoded(), Some(&json!({"items": 3})));
    assert_eq!(second.decoded(), first.decoded());
}

#[tokio::test]
async fn test_plugins_decorate_outgoing_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header("authorization", "Bearer s3cret"))
        .and(header_exists(REQUEST_ID_HEADER))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let metrics = Arc::new(MetricsPlugin::new());
    let mut config = ClientConfig::default();
    config.base_url = Some(server.uri());

    let client = switchyard::client_builder(&config)
        .unwrap()
        .plugin(AuthPlugin::bearer("s3cret"))
        .plugin(RequestIdPlugin::new())
        .plugin_arc(metrics.clone())
        .build()
        .unwrap();

    let options = RequestOptions::new().json(&json!({"kind": "signup"})).unwrap();
    let response = client.post("/events", options).await.unwrap();

    assert_eq!(response.status(), 202);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.responses, 1);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = ClientConfig::default();
    config.base_url = Some(server.uri());
    let client = switchyard::client_builder(&config).unwrap().build().unwrap();

    let err = client.get("/missing", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.status_code(), Some(404));
}

// =============================================================================
// GraphQL through the façade
// =============================================================================

#[tokio::test]
async fn test_graphql_through_configured_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"viewer": {"login": "ada"}}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::from_json_str(
        &json!({
            "protocols": {
                "graphql": {"base_url": server.uri(), "endpoint": "/graphql"}
            }
        })
        .to_string(),
    )
    .unwrap();

    let client = switchyard::client_builder(&config).unwrap().build().unwrap();
    let response = client
        .graphql("{ viewer { login } }", None, RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.protocol(), "graphql");
    assert_eq!(response.decoded(), Some(&json!({"viewer": {"login": "ada"}})));
}

#[tokio::test]
async fn test_client_base_url_leaves_graphql_endpoint_alone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ok": true}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::from_toml_str(&format!(
        r#"
        base_url = "{uri}/"

        [protocols.graphql]
        endpoint = "{uri}/graphql"
        "#,
        uri = server.uri()
    ))
    .unwrap();

    let client = switchyard::client_builder(&config).unwrap().build().unwrap();

    let response = client.graphql("{ ok }", None, RequestOptions::new()).await.unwrap();
    assert_eq!(response.decoded(), Some(&json!({"ok": true})));

    let status = client.get("status", RequestOptions::new()).await.unwrap();
    assert_eq!(status.status(), 200);
}

// =============================================================================
// Custom transports
// =============================================================================

#[tokio::test]
async fn test_custom_transport_alongside_builtins() {
    let stub = StubProtocol::new("mqtt")
        .always(|_| Ok(Response::new("mqtt", 200).with_body("ack")));
    let handle = stub.clone();

    let client = switchyard::client_builder(&ClientConfig::default())
        .unwrap()
        .protocol("mqtt", move |_| Ok(stub.clone().into_protocol()))
        .build()
        .unwrap();

    let response = client
        .post("sensors/7", RequestOptions::new().protocol("mqtt"))
        .await
        .unwrap();

    assert_eq!(response.text().unwrap(), "ack");
    assert_eq!(handle.calls(), 1);
    assert_eq!(handle.last_request().unwrap().target(), "sensors/7");
}
