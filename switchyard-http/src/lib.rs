//! # Switchyard HTTP
//!
//! HTTP transport for Switchyard, built on `reqwest` with connection
//! pooling, gzip/brotli compression and redirect handling.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchyard_core::{Client, RequestOptions};
//! use switchyard_http::{HttpConfig, HttpProtocol};
//!
//! #[tokio::main]
//! async fn main() -> switchyard_core::Result<()> {
//!     let client = Client::builder()
//!         .protocol("http", |_| {
//!             let config = HttpConfig::builder()
//!                 .base_url("https://api.example.com")
//!                 .build();
//!             Ok(std::sync::Arc::new(HttpProtocol::new(config)?))
//!         })
//!         .build()?;
//!
//!     let users = client.get("/users", RequestOptions::new()).await?;
//!     println!("Status: {}", users.status());
//!     Ok(())
//! }
//! ```
//!
//! Targets are resolved against the base URL. A `params` extension object is
//! appended to the query string. JSON responses are decoded into
//! [`Response::decoded`](switchyard_core::Response::decoded); non-2xx
//! statuses become protocol errors carrying the status code.

mod config;
mod protocol;

pub use config::{HttpConfig, HttpConfigBuilder};
pub use protocol::{HttpProtocol, PROTOCOL_NAME};
