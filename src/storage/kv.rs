// The persistence collaborator: a synchronous key-value store whose writes are
// durable before `set` returns

use crate::error::{NodeError, Result};
use log::error;
use serde_json::Value;
use sled::Db;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Returns whether the key was present
    fn delete(&self, key: &str) -> Result<bool>;
}

/// Sled-backed store; every write is flushed before it is acknowledged
pub struct SledStore {
    db: Db,
    db_path: PathBuf,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<SledStore> {
        let db = sled::open(path)
            .map_err(|e| NodeError::Database(format!("Failed to open database: {e}")))?;
        Ok(SledStore {
            db,
            db_path: path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        self.db_path.as_path()
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw = self
            .db
            .get(key)
            .map_err(|e| NodeError::Database(format!("Failed to read {key}: {e}")))?;
        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db
            .insert(key, bytes)
            .map_err(|e| NodeError::Database(format!("Failed to write {key}: {e}")))?;
        self.db
            .flush()
            .map_err(|e| NodeError::Database(format!("Failed to flush after {key}: {e}")))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let previous = self
            .db
            .remove(key)
            .map_err(|e| NodeError::Database(format!("Failed to delete {key}: {e}")))?;
        self.db
            .flush()
            .map_err(|e| NodeError::Database(format!("Failed to flush after {key}: {e}")))?;
        Ok(previous.is_some())
    }
}

/// ( K -> key, V => JSON value ), lost on exit
pub struct MemoryStore {
    inner: RwLock<HashMap<String, Value>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(map) => map.len(),
            Err(_) => {
                error!("Failed to acquire read lock on memory store");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let map = self
            .inner
            .read()
            .map_err(|e| NodeError::Database(format!("Failed to acquire store lock: {e}")))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|e| NodeError::Database(format!("Failed to acquire store lock: {e}")))?;
        map.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut map = self
            .inner
            .write()
            .map_err(|e| NodeError::Database(format!("Failed to acquire store lock: {e}")))?;
        Ok(map.remove(key).is_some())
    }
}
