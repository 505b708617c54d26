//! Name-keyed protocol registry.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{Capabilities, ClientError, Protocol, ProtocolConfig, ProtocolFactory, Result, ResultExt};

struct Registration {
    factory: ProtocolFactory,
    config: ProtocolConfig,
    instance: Arc<dyn Protocol>,
    capabilities: Capabilities,
}

/// Lookup from transport name to protocol implementation.
///
/// Built before the client and owned by it; immutable once the client has
/// been constructed.
#[derive(Default, Clone)]
pub struct ProtocolRegistry {
    entries: HashMap<String, Arc<Registration>>,
}

impl ProtocolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol constructor with an empty configuration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&ProtocolConfig) -> Result<Arc<dyn Protocol>> + Send + Sync + 'static,
    {
        self.register_with_config(name, ProtocolConfig::default(), factory)
    }

    /// Register a protocol constructor.
    ///
    /// The protocol is constructed immediately and its capabilities are
    /// computed and validated, so a broken transport fails here rather than
    /// on its first call. Registering a name twice replaces the earlier entry.
    pub fn register_with_config<F>(
        &mut self,
        name: impl Into<String>,
        config: ProtocolConfig,
        factory: F,
    ) -> Result<()>
    where
        F: Fn(&ProtocolConfig) -> Result<Arc<dyn Protocol>> + Send + Sync + 'static,
    {
        let name = normalize(name.into())?;
        let factory: ProtocolFactory = Arc::new(factory);

        let instance = factory(&config)
            .with_context(|| format!("failed to create protocol '{name}'"))?;
        let capabilities = instance.capabilities();
        capabilities
            .validate()
            .with_context(|| format!("protocol '{name}' reported invalid capabilities"))?;

        debug!(protocol = %name, ?capabilities, "Registered protocol");

        let registration = Registration {
            factory,
            config,
            instance,
            capabilities,
        };
        if self.entries.insert(name.clone(), Arc::new(registration)).is_some() {
            warn!(protocol = %name, "Protocol registered twice, last registration wins");
        }
        Ok(())
    }

    /// Get the pooled instance for a protocol.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Protocol>> {
        self.entry(name).map(|entry| entry.instance.clone())
    }

    /// Build a fresh instance from the stored constructor and configuration.
    pub fn instantiate(&self, name: &str) -> Result<Arc<dyn Protocol>> {
        let entry = self.entry(name)?;
        (entry.factory)(&entry.config)
            .with_context(|| format!("failed to create protocol '{name}'"))
    }

    /// Get the cached capabilities of a protocol.
    pub fn capabilities(&self, name: &str) -> Result<Capabilities> {
        self.entry(name).map(|entry| entry.capabilities)
    }

    /// Get the configuration a protocol was registered with.
    pub fn config(&self, name: &str) -> Result<&ProtocolConfig> {
        self.entry(name).map(|entry| &entry.config)
    }

    /// Check if a protocol is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered protocols.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no protocol is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Result<&Registration> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.as_ref())
            .ok_or_else(|| {
                ClientError::configuration(format!(
                    "unknown protocol '{name}' (registered: {})",
                    self.names().join(", ")
                ))
            })
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.names())
            .finish()
    }
}

fn normalize(name: String) -> Result<String> {
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err(ClientError::configuration("protocol name must not be empty"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubProtocol;
    use crate::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_unknown_protocol_is_configuration_error() {
        let mut registry = ProtocolRegistry::new();
        registry.register("http", |_| Ok(StubProtocol::new("http").into_protocol())).unwrap();

        let err = registry.resolve("grpc").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("grpc"));
    }

    #[test]
    fn test_capabilities_cached_at_registration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut registry = ProtocolRegistry::new();
        registry
            .register("stub", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(StubProtocol::new("stub").into_protocol())
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        registry.capabilities("stub").unwrap();
        registry.resolve("stub").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        registry.instantiate("stub").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_capabilities_fail_fast() {
        let mut registry = ProtocolRegistry::new();
        let caps = Capabilities::new()
            .with_timeout_bounds(Duration::from_secs(5), Duration::from_secs(1));

        let err = registry
            .register("broken", move |_| {
                Ok(StubProtocol::new("broken").with_capabilities(caps).into_protocol())
            })
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!registry.contains("broken"));
    }

    #[test]
    fn test_factory_failure_fails_fast() {
        let mut registry = ProtocolRegistry::new();
        let err = registry
            .register("http", |_| Err(ClientError::configuration("missing base_url")))
            .unwrap_err();
        assert!(err.to_string().contains("missing base_url"));
    }

    #[test]
    fn test_names_are_case_insensitive_and_last_wins() {
        let mut registry = ProtocolRegistry::new();
        registry.register("HTTP", |_| Ok(StubProtocol::new("first").into_protocol())).unwrap();
        registry.register("http", |_| Ok(StubProtocol::new("second").into_protocol())).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("Http").unwrap().name(), "second");
        assert_eq!(registry.names(), vec!["http".to_string()]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = ProtocolRegistry::new();
        let err = registry
            .register("  ", |_| Ok(StubProtocol::new("x").into_protocol()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
