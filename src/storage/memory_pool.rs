use crate::core::ObjectId;
use log::error;
use std::sync::RwLock;

/// Ids of valid spending transactions accepted since start, in arrival order.
///
/// Nothing is ever evicted; entries only go away with the process.
pub struct MemoryPool {
    inner: RwLock<Vec<ObjectId>>,
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool {
            inner: RwLock::new(vec![]),
        }
    }

    pub fn add(&self, txid: ObjectId) {
        match self.inner.write() {
            Ok(mut pool) => {
                if !pool.contains(&txid) {
                    pool.push(txid);
                }
            }
            Err(_) => {
                error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    pub fn contains(&self, txid: &ObjectId) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.contains(txid),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    pub fn get_all(&self) -> Vec<ObjectId> {
        match self.inner.read() {
            Ok(pool) => pool.clone(),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
