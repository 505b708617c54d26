//! Per-call state shared between plugins.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Per-call mapping of string keys to values.
///
/// A fresh context is created for every call and threaded through all
/// before- and after-hooks of that call, so one plugin can hand data to a
/// later one (a cache key, a start timestamp) without global state.
#[derive(Default)]
pub struct PluginContext {
    protocol: String,
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl PluginContext {
    /// Create a context for a call routed to `protocol`.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            values: HashMap::new(),
        }
    }

    /// Name of the protocol serving this call.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Insert a value, replacing any previous value under the same key.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Get a value. Returns `None` if the key is absent or holds another type.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Remove and return a value.
    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &str) -> Option<T> {
        match self.values.remove(key)?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(original) => {
                self.values.insert(key.to_string(), original);
                None
            }
        }
    }

    /// Check if a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the context holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("PluginContext")
            .field("protocol", &self.protocol)
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut ctx = PluginContext::new("http");
        ctx.insert("cache.key", "abc".to_string());
        ctx.insert("attempts", 3u32);

        assert_eq!(ctx.get::<String>("cache.key").map(String::as_str), Some("abc"));
        assert_eq!(ctx.get::<u32>("attempts"), Some(&3));
        assert_eq!(ctx.get::<u64>("attempts"), None);
        assert_eq!(ctx.protocol(), "http");
    }

    #[test]
    fn test_remove_wrong_type_keeps_value() {
        let mut ctx = PluginContext::new("http");
        ctx.insert("n", 1u8);

        assert_eq!(ctx.remove::<String>("n"), None);
        assert!(ctx.contains_key("n"));
        assert_eq!(ctx.remove::<u8>("n"), Some(1));
        assert!(ctx.is_empty());
    }
}
