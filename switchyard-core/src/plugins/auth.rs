//! Credential injection.

use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;

use crate::{BeforeRequest, ClientError, Hooks, Plugin, PluginContext, Request, Result};

/// Supplies credentials at call time.
///
/// This is where token refresh, vault lookups or any other authentication
/// policy plugs in.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return the header name and value to attach to `request`.
    async fn credentials(&self, request: &Request) -> Result<(String, String)>;
}

enum AuthType {
    Bearer(String),
    Basic { username: String, password: String },
    ApiKey { header: String, key: String },
    Provider(Arc<dyn CredentialProvider>),
}

/// Authentication plugin that adds auth headers.
///
/// An `Authorization` header already on the request is left alone.
pub struct AuthPlugin {
    auth_type: AuthType,
    overwrite: bool,
}

impl AuthPlugin {
    /// Create a bearer token plugin.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::with_type(AuthType::Bearer(token.into()))
    }

    /// Create a basic auth plugin.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_type(AuthType::Basic {
            username: username.into(),
            password: password.into(),
        })
    }

    /// Create an API key plugin.
    pub fn api_key(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self::with_type(AuthType::ApiKey {
            header: header.into(),
            key: key.into(),
        })
    }

    /// Create a plugin that asks `provider` for credentials on every call.
    pub fn provider(provider: Arc<dyn CredentialProvider>) -> Self {
        Self::with_type(AuthType::Provider(provider))
    }

    /// Replace credentials already present on the request.
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    fn with_type(auth_type: AuthType) -> Self {
        Self {
            auth_type,
            overwrite: false,
        }
    }

    async fn header_for(&self, request: &Request) -> Result<(String, String)> {
        Ok(match &self.auth_type {
            AuthType::Bearer(token) => ("authorization".into(), format!("Bearer {token}")),
            AuthType::Basic { username, password } => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                ("authorization".into(), format!("Basic {credentials}"))
            }
            AuthType::ApiKey { header, key } => (header.clone(), key.clone()),
            AuthType::Provider(provider) => provider.credentials(request).await?,
        })
    }
}

#[async_trait]
impl Plugin for AuthPlugin {
    fn name(&self) -> &str {
        "auth"
    }

    fn hooks(&self) -> Hooks {
        Hooks::BEFORE_REQUEST
    }

    async fn before_request(&self, request: Request, _ctx: &mut PluginContext) -> Result<BeforeRequest> {
        let (name, value) = self
            .header_for(&request)
            .await
            .map_err(|e| ClientError::plugin("auth", e.message()))?;

        if !self.overwrite && request.header(&name).is_some() {
            return Ok(BeforeRequest::Continue(request));
        }

        let request = request
            .with_header(&name, &value)
            .map_err(|e| ClientError::plugin("auth", e.message()))?;
        Ok(BeforeRequest::Continue(request))
    }
}
