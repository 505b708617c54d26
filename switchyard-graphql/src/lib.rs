//! # Switchyard GraphQL
//!
//! GraphQL-over-HTTP transport for Switchyard.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use switchyard_core::{Client, ProtocolConfig, RequestOptions};
//! use switchyard_graphql::GraphqlProtocol;
//!
//! #[tokio::main]
//! async fn main() -> switchyard_core::Result<()> {
//!     let client = Client::builder()
//!         .protocol_with_config(
//!             "graphql",
//!             ProtocolConfig::new().base_url("https://api.example.com/graphql"),
//!             GraphqlProtocol::factory,
//!         )
//!         .build()?;
//!
//!     let response = client
//!         .graphql(
//!             "query($id: ID!) { user(id: $id) { name } }",
//!             Some(json!({ "id": "1" })),
//!             RequestOptions::new(),
//!         )
//!         .await?;
//!     println!("{:?}", response.decoded());
//!     Ok(())
//! }
//! ```
//!
//! The query comes from the `query` extension (or a JSON body shaped like a
//! GraphQL payload), with optional `variables` and `operation_name`
//! extensions. A successful call decodes the `data` member; a non-empty
//! `errors` list becomes a protocol error.

mod config;
mod payload;
mod protocol;

pub use config::GraphqlConfig;
pub use payload::{
    ErrorLocation, GraphQLRequest, GraphQLResponse, GraphQLResponseError, PathSegment, format_path,
};
pub use protocol::{GraphqlProtocol, PROTOCOL_NAME};
