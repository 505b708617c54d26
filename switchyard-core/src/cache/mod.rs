//! TTL response cache, wired into the pipeline as a plugin.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use switchyard_core::cache::{CachePlugin, InMemoryCacheStore};
//!
//! let store = Arc::new(InMemoryCacheStore::new());
//! let plugin = CachePlugin::new(store, Duration::from_secs(60));
//! ```

mod plugin;
mod store;

pub use plugin::{CACHE_KEY_CONTEXT, CACHE_KEY_HEADER, CachePlugin};
pub use store::{CacheEntry, CacheStore, InMemoryCacheStore};
