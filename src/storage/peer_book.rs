use crate::error::{NodeError, Result};
use crate::storage::KeyValueStore;
use log::info;
use serde_json::Value;
use std::sync::{Arc, Mutex};

const PEERS_KEY: &str = "peers";

/// Persisted list of peer addresses worth dialing on the next start
pub struct PeerBook {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl PeerBook {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> PeerBook {
        PeerBook {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    pub fn addresses(&self) -> Result<Vec<String>> {
        match self.kv.get(PEERS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(vec![]),
        }
    }

    /// Remember `address`; returns `false` if it was already known
    pub fn record(&self, address: &str) -> Result<bool> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| NodeError::Database(format!("Failed to acquire peer book lock: {e}")))?;
        let mut addresses = self.addresses()?;
        if addresses.iter().any(|known| known == address) {
            return Ok(false);
        }
        addresses.push(address.to_string());
        self.kv.set(PEERS_KEY, &Value::from(addresses))?;
        Ok(true)
    }

    /// Fall back to `seeds` when nothing has been learned yet
    pub fn seed_if_empty(&self, seeds: &[String]) -> Result<Vec<String>> {
        let known = self.addresses()?;
        if !known.is_empty() || seeds.is_empty() {
            return Ok(known);
        }
        info!("Peer book empty, using {} configured seed peers", seeds.len());
        for seed in seeds {
            self.record(seed)?;
        }
        self.addresses()
    }
}
