use crate::core::ObjectId;
use crate::error::{NodeError, Result};
use crate::storage::KeyValueStore;
use serde_json::Value;
use std::sync::{Arc, Mutex};

const OBJECT_KEY_PREFIX: &str = "object:";

/// Append-only, content-addressed map from object id to raw object
#[derive(Clone)]
pub struct ObjectStore {
    kv: Arc<dyn KeyValueStore>,
    // Serializes check-then-insert so an id is written at most once
    write_lock: Arc<Mutex<()>>,
}

impl ObjectStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> ObjectStore {
        ObjectStore {
            kv,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn key(id: &ObjectId) -> String {
        format!("{OBJECT_KEY_PREFIX}{id}")
    }

    pub fn get(&self, id: &ObjectId) -> Result<Option<Value>> {
        self.kv.get(&Self::key(id))
    }

    pub fn contains(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Insert `object` under `id`; returns `false` if the id was already stored
    pub fn put(&self, id: &ObjectId, object: &Value) -> Result<bool> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| NodeError::Database(format!("Failed to acquire object lock: {e}")))?;
        let key = Self::key(id);
        if self.kv.get(&key)?.is_some() {
            return Ok(false);
        }
        self.kv.set(&key, object)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::thread;

    fn store() -> ObjectStore {
        ObjectStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_put_get_contains() {
        let store = store();
        let object = json!({"type": "transaction", "height": 0, "outputs": []});
        let id = ObjectId::of(&object).unwrap();

        assert!(!store.contains(&id).unwrap());
        assert!(store.put(&id, &object).unwrap());
        assert!(store.contains(&id).unwrap());
        assert_eq!(store.get(&id).unwrap(), Some(object));
    }

    #[test]
    fn test_duplicate_put_is_noop() {
        let store = store();
        let object = json!({"type": "block", "txids": []});
        let id = ObjectId::of(&object).unwrap();

        assert!(store.put(&id, &object).unwrap());
        assert!(!store.put(&id, &json!({"type": "block", "other": true})).unwrap());
        assert_eq!(store.get(&id).unwrap(), Some(object));
    }

    #[test]
    fn test_concurrent_put_inserts_once() {
        let store = store();
        let object = json!({"type": "block", "txids": [], "note": "race"});
        let id = ObjectId::of(&object).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let id = id.clone();
                let object = object.clone();
                thread::spawn(move || store.put(&id, &object).unwrap())
            })
            .collect();
        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fresh| *fresh)
            .count();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn test_stored_id_is_stable() {
        let store = store();
        let object = json!({"outputs": [{"value": 7, "pubkey": "00"}], "type": "transaction"});
        let id = ObjectId::of(&object).unwrap();
        store.put(&id, &object).unwrap();

        let reloaded = store.get(&id).unwrap().unwrap();
        assert_eq!(ObjectId::of(&reloaded).unwrap(), id);
    }
}
