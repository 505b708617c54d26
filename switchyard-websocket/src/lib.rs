//! # Switchyard WebSocket
//!
//! Request/reply transport over WebSocket using `tokio-tungstenite`.
//!
//! A call sends the request body as a single message (text for JSON and
//! UTF-8 bodies, binary otherwise) and completes with the first data message
//! the peer sends back. Text replies that parse as JSON are exposed through
//! [`Response::decoded`](switchyard_core::Response::decoded). Successful
//! exchanges report status `101`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use switchyard_core::{Client, ProtocolConfig, RequestOptions};
//! use switchyard_websocket::WebSocketProtocol;
//!
//! #[tokio::main]
//! async fn main() -> switchyard_core::Result<()> {
//!     let client = Client::builder()
//!         .protocol_with_config(
//!             "websocket",
//!             ProtocolConfig::new().base_url("ws://localhost:9001"),
//!             WebSocketProtocol::factory,
//!         )
//!         .default_protocol("websocket")
//!         .build()?;
//!
//!     let reply = client
//!         .post("/rpc", RequestOptions::new().json(&json!({"op": "status"}))?)
//!         .await?;
//!     println!("{}", reply.text()?);
//!     Ok(())
//! }
//! ```
//!
//! Connections are kept in an idle pool keyed by URL and handshake headers,
//! so calls carrying different credentials never share one. A connection goes back
//! to the pool only after a complete exchange; a cancelled or failed call
//! closes it.

mod config;
mod message;
mod pool;
mod protocol;

pub use config::WebSocketConfig;
pub use message::{Message, MessageType};
pub use pool::{ConnectionPool, PoolKey, WsStream};
pub use protocol::{PROTOCOL_NAME, SWITCHING_PROTOCOLS, WebSocketProtocol};
