//! WebSocket transport against in-process servers.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use switchyard_core::{Client, ErrorKind, Protocol, ProtocolConfig, Request, RequestOptions};
use switchyard_websocket::{WebSocketConfig, WebSocketProtocol};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as Handshake, Response as HandshakeResponse,
};
use tokio_tungstenite::{accept_async, accept_hdr_async};

#[derive(Clone, Copy)]
enum Behavior {
    Echo,
    Silent,
    CloseImmediately,
}

/// Start a server and return its base URL and a connection counter.
async fn server(behavior: Behavior) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(tcp).await else {
                    return;
                };
                match behavior {
                    Behavior::Echo => {
                        while let Some(Ok(message)) = ws.next().await {
                            if (message.is_text() || message.is_binary())
                                && ws.send(message).await.is_err()
                            {
                                break;
                            }
                        }
                    }
                    Behavior::Silent => while let Some(Ok(_)) = ws.next().await {},
                    Behavior::CloseImmediately => {
                        let _ = ws.close(None).await;
                    }
                }
            });
        }
    });

    (format!("ws://{addr}"), connections)
}

/// Echo server that records the `authorization` header of each handshake.
async fn recording_server() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let log = log.clone();
            tokio::spawn(async move {
                let record = move |req: &Handshake,
                                   resp: HandshakeResponse|
                      -> Result<HandshakeResponse, ErrorResponse> {
                    let auth = req
                        .headers()
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    log.lock().push(auth);
                    Ok(resp)
                };
                let Ok(mut ws) = accept_hdr_async(tcp, record).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() && ws.send(message).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (format!("ws://{addr}"), seen)
}

fn protocol(base: &str) -> WebSocketProtocol {
    WebSocketProtocol::new(WebSocketConfig::new(base).with_timeout(Duration::from_secs(5))).unwrap()
}

#[tokio::test]
async fn test_json_message_echoes_and_decodes() {
    let (base, _) = server(Behavior::Echo).await;
    let ws = protocol(&base);

    let request = Request::post("/rpc").with_json(&json!({"op": "sum", "args": [1, 2]})).unwrap();
    let response = ws.execute(request).await.unwrap();

    assert_eq!(response.status(), 101);
    assert_eq!(response.protocol(), "websocket");
    assert_eq!(response.decoded(), Some(&json!({"op": "sum", "args": [1, 2]})));
}

#[tokio::test]
async fn test_binary_message_round_trips() {
    let (base, _) = server(Behavior::Echo).await;
    let ws = protocol(&base);

    let payload = bytes::Bytes::from_static(&[0x00, 0xff, 0x10]);
    let response = ws
        .execute(Request::post("/bin").with_body(payload.clone()))
        .await
        .unwrap();

    assert_eq!(response.bytes(), &payload);
    assert!(response.decoded().is_none());
}

#[tokio::test]
async fn test_connection_is_reused_after_complete_exchange() {
    let (base, connections) = server(Behavior::Echo).await;
    let ws = protocol(&base);

    for i in 0..3 {
        let request = Request::post("/rpc").with_json(&json!({"n": i})).unwrap();
        ws.execute(request).await.unwrap();
    }

    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(ws.pool().idle_count(&format!("{base}/rpc")), 1);
}

#[tokio::test]
async fn test_connections_are_not_shared_across_credentials() {
    let (base, seen) = recording_server().await;
    let ws = protocol(&base);

    for user in ["alice", "bob", "alice"] {
        let request = Request::post("/rpc")
            .with_header("authorization", &format!("Bearer {user}"))
            .unwrap()
            .with_json(&json!({"user": user}))
            .unwrap();
        let response = ws.execute(request).await.unwrap();
        assert_eq!(response.decoded(), Some(&json!({"user": user})));
    }

    assert_eq!(*seen.lock(), vec!["Bearer alice", "Bearer bob"]);
    assert_eq!(ws.pool().idle_count(&format!("{base}/rpc")), 2);
}

#[tokio::test]
async fn test_timed_out_exchange_drops_connection() {
    let (base, _) = server(Behavior::Silent).await;
    let ws = protocol(&base);

    let request = Request::post("/rpc")
        .with_body(bytes::Bytes::from_static(b"hello"))
        .with_timeout(Duration::from_millis(100));
    let err = ws.execute(request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(ws.pool().idle_count(&format!("{base}/rpc")), 0);
}

#[tokio::test]
async fn test_peer_close_is_network_error() {
    let (base, _) = server(Behavior::CloseImmediately).await;
    let ws = protocol(&base);

    let request = Request::post("/").with_json(&json!({"op": "x"})).unwrap();
    let err = ws.execute(request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_invalid_requests_fail_before_connecting() {
    let (base, connections) = server(Behavior::Echo).await;
    let ws = WebSocketProtocol::new(WebSocketConfig::new(&base).with_max_message_size(8)).unwrap();

    let wrong_scheme = Request::post("http://127.0.0.1/").with_json(&json!({})).unwrap();
    assert_eq!(ws.execute(wrong_scheme).await.unwrap_err().kind(), ErrorKind::Validation);

    let no_body = Request::post("/rpc");
    assert_eq!(ws.execute(no_body).await.unwrap_err().kind(), ErrorKind::Validation);

    let too_large = Request::post("/rpc").with_json(&json!({"payload": "0123456789"})).unwrap();
    assert_eq!(ws.execute(too_large).await.unwrap_err().kind(), ErrorKind::Validation);

    assert_eq!(connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_health_check_connects() {
    let (base, _) = server(Behavior::Echo).await;
    assert!(protocol(&base).health_check().await.unwrap());

    let refused = WebSocketProtocol::new(
        WebSocketConfig::new("ws://127.0.0.1:1").with_connect_timeout(Duration::from_secs(2)),
    )
    .unwrap();
    assert!(!refused.health_check().await.unwrap());

    let unconfigured = WebSocketProtocol::new(WebSocketConfig::default()).unwrap();
    assert_eq!(
        unconfigured.health_check().await.unwrap_err().kind(),
        ErrorKind::Configuration
    );
}

#[tokio::test]
async fn test_client_routes_to_websocket() {
    let (base, _) = server(Behavior::Echo).await;
    let client = Client::builder()
        .protocol_with_config(
            "websocket",
            ProtocolConfig::new().base_url(base),
            WebSocketProtocol::factory,
        )
        .default_protocol("websocket")
        .build()
        .unwrap();

    let options = RequestOptions::new()
        .protocol("websocket")
        .json(&json!({"hello": "world"}))
        .unwrap();
    let response = client.post("/chat", options).await.unwrap();
    assert_eq!(response.text().unwrap(), r#"{"hello":"world"}"#);
}
