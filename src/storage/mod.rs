//! Key/value persistence.
//!
//! Modules persist their enabled flag and properties through [`Storage`].
//! Values are JSON; keys are plain strings. [`PrefixedStorage`] namespaces
//! every key so the runtime never collides with other scripts sharing the
//! same backend.
//!
//! Backends:
//! - [`MemoryStorage`]: process-local map, for tests and demos;
//! - [`JsonFileStorage`]: one JSON document on disk, rewritten on every
//!   change.

mod file;
mod memory;

use std::sync::Arc;

use serde_json::Value;

use crate::error::StorageError;

pub use file::JsonFileStorage;
pub use memory::MemoryStorage;

/// JSON key/value store.
pub trait Storage: Send + Sync + 'static {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Deletes `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Namespaces every key of an inner store.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use pagevisor::{MemoryStorage, PrefixedStorage, Storage};
///
/// let backend = Arc::new(MemoryStorage::new());
/// let store = PrefixedStorage::new(backend.clone(), "extensions.pagevisor.");
///
/// store.set("lang", json!("fr")).unwrap();
/// assert_eq!(backend.get("extensions.pagevisor.lang").unwrap(), Some(json!("fr")));
/// assert_eq!(store.get("lang").unwrap(), Some(json!("fr")));
/// ```
#[derive(Clone)]
pub struct PrefixedStorage {
    inner: Arc<dyn Storage>,
    prefix: String,
}

impl PrefixedStorage {
    pub fn new(inner: Arc<dyn Storage>, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl Storage for PrefixedStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.inner.get(&self.key(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.inner.set(&self.key(key), value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(&self.key(key))
    }
}

impl std::fmt::Debug for PrefixedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixedStorage")
            .field("prefix", &self.prefix)
            .finish()
    }
}
