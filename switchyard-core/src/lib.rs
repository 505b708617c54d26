//! # Switchyard Core
//!
//! Transport-independent half of Switchyard: the request pipeline that every
//! protocol runs through.
//!
//! ## Features
//!
//! - **Error taxonomy**: one [`ClientError`] per failure kind, composed with
//!   the standard `Result` combinators
//! - **Protocols**: a [`Protocol`] trait and a name-keyed [`ProtocolRegistry`]
//!   with capabilities cached at registration
//! - **Plugins**: ordered before/after hooks with per-call [`PluginContext`]
//! - **Retry**: attempt budgets with exponential backoff
//! - **Cache**: TTL response cache wired in as a plugin
//!
//! ## Quick Start
//!
//! ```rust
//! use switchyard_core::testing::StubProtocol;
//! use switchyard_core::{Client, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> switchyard_core::Result<()> {
//!     let client = Client::builder()
//!         .protocol("http", |_| Ok(StubProtocol::new("http").into_protocol()))
//!         .build()?;
//!
//!     let response = client.get("/users", RequestOptions::new()).await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod cache;
mod capabilities;
mod client;
pub mod config;
mod context;
mod error;
pub mod logging;
mod options;
mod pipeline;
mod plugin;
pub mod plugins;
mod protocol;
mod registry;
mod request;
mod response;
pub mod retry;
pub mod testing;

pub use capabilities::Capabilities;
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use context::PluginContext;
pub use error::{ClientError, ErrorKind, Result, ResultExt};
pub use options::RequestOptions;
pub use pipeline::Pipeline;
pub use plugin::{BeforeRequest, Hooks, Plugin};
pub use protocol::{Protocol, ProtocolConfig, ProtocolFactory};
pub use registry::ProtocolRegistry;
pub use request::{Body, Request};
pub use response::Response;
pub use retry::{BackoffStrategy, RetryPolicy};

pub use http::{HeaderMap, Method};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::cache::{CachePlugin, CacheStore, InMemoryCacheStore};
    pub use crate::plugins::{AuthPlugin, HeadersPlugin, LoggingPlugin, MetricsPlugin, RequestIdPlugin};
    pub use crate::{
        BackoffStrategy, BeforeRequest, Body, Capabilities, Client, ClientBuilder, ClientConfig,
        ClientError, ErrorKind, Hooks, Method, Plugin, PluginContext, Protocol, ProtocolConfig,
        ProtocolRegistry, Request, RequestOptions, Response, Result, ResultExt, RetryPolicy,
    };
}
