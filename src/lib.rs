//! # Switchyard
//!
//! A protocol-agnostic outbound client runtime. Calls go through one
//! pipeline regardless of transport: plugins run before and after the call,
//! failures are retried according to a [`RetryPolicy`], and every fallible
//! step returns a [`Result`] whose error carries exactly one [`ErrorKind`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchyard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> switchyard::Result<()> {
//!     let config = ClientConfig::from_toml_str(r#"
//!         default_protocol = "http"
//!         base_url = "https://api.example.com"
//!
//!         [retry]
//!         max_attempts = 3
//!
//!         [cache]
//!         ttl_secs = 60
//!     "#)?;
//!
//!     let client = switchyard::client_builder(&config)?
//!         .plugin(AuthPlugin::bearer("secret-token"))
//!         .build()?;
//!
//!     let users = client.get("/users", RequestOptions::new()).await?;
//!     println!("{}", users.text()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `http` - [`HttpProtocol`](switchyard_http::HttpProtocol) (default)
//! - `graphql` - [`GraphqlProtocol`](switchyard_graphql::GraphqlProtocol) (default)
//! - `websocket` - [`WebSocketProtocol`](switchyard_websocket::WebSocketProtocol) (default)

pub use switchyard_core::*;

#[cfg(feature = "http")]
pub use switchyard_http;

#[cfg(feature = "graphql")]
pub use switchyard_graphql;

#[cfg(feature = "websocket")]
pub use switchyard_websocket;

use tracing::debug;

/// Build a registry holding every built-in transport enabled by features.
///
/// Each transport is constructed from the matching entry of
/// `config.protocols`, or from defaults when there is none.
pub fn default_registry(config: &ClientConfig) -> Result<ProtocolRegistry> {
    #[allow(unused_mut)]
    let mut registry = ProtocolRegistry::new();

    #[cfg(feature = "http")]
    registry.register_with_config(
        switchyard_http::PROTOCOL_NAME,
        config.protocol(switchyard_http::PROTOCOL_NAME),
        switchyard_http::HttpProtocol::factory,
    )?;

    #[cfg(feature = "graphql")]
    registry.register_with_config(
        switchyard_graphql::PROTOCOL_NAME,
        config.protocol(switchyard_graphql::PROTOCOL_NAME),
        switchyard_graphql::GraphqlProtocol::factory,
    )?;

    #[cfg(feature = "websocket")]
    registry.register_with_config(
        switchyard_websocket::PROTOCOL_NAME,
        config.protocol(switchyard_websocket::PROTOCOL_NAME),
        switchyard_websocket::WebSocketProtocol::factory,
    )?;

    debug!(protocols = ?registry.names(), "Built default protocol registry");
    Ok(registry)
}

/// Start a [`ClientBuilder`] with the built-in transports registered and the
/// client-level settings of `config` applied.
pub fn client_builder(config: &ClientConfig) -> Result<ClientBuilder> {
    config.validate()?;
    let registry = default_registry(config)?;
    Ok(Client::builder().registry(registry).from_config(config))
}

/// Prelude for common imports.
pub mod prelude {
    pub use switchyard_core::prelude::*;

    #[cfg(feature = "graphql")]
    pub use switchyard_graphql::GraphqlProtocol;
    #[cfg(feature = "http")]
    pub use switchyard_http::HttpProtocol;
    #[cfg(feature = "websocket")]
    pub use switchyard_websocket::WebSocketProtocol;
}
