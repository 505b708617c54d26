//! Built-in plugins.

mod auth;
mod headers;
mod logging;
mod metrics;

pub use auth::{AuthPlugin, CredentialProvider};
pub use headers::{HeadersPlugin, REQUEST_ID_HEADER, RequestIdPlugin};
pub use logging::LoggingPlugin;
pub use metrics::{MetricsPlugin, MetricsSnapshot, RequestMetrics};
