use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::Storage;
use crate::error::StorageError;

/// [`Storage`] backed by a single JSON document.
///
/// The document is loaded once on [`open`](Self::open), cached in memory and
/// rewritten on every `set`/`remove`. The cache only changes once the write
/// succeeded.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStorage {
    /// Opens (or prepares to create) the document at `path`.
    ///
    /// A missing file is an empty store; an unreadable or malformed one is
    /// an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let cache = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = cache.len(), "storage opened");
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, cache: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(cache)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.cache.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut cache = self.cache.lock();
        let mut next = cache.clone();
        next.insert(key.to_string(), value);
        self.flush(&next)?;
        *cache = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.lock();
        if !cache.contains_key(key) {
            return Ok(());
        }
        let mut next = cache.clone();
        next.remove(key);
        self.flush(&next)?;
        *cache = next;
        Ok(())
    }
}
