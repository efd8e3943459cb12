use crate::config::VersionPattern;
use crate::core::ObjectId;
use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static DEFAULT_NODE_ADDR: &str = "0.0.0.0:18018";
static DEFAULT_DB_PATH: &str = "data/node";
static DEFAULT_VERSION: &str = "0.2.0";
static DEFAULT_VERSION_PATTERN: &str = "0.2.x";

/// Id of the only block this node accepts without chain validation
pub const GENESIS_ID: &str = "0000000052a0e645eca917ae1c196e0d0a4fb756747f29ef52594d68484bb5e2";

/// Reward carried by the single output of a coinbase transaction
pub const COINBASE_VALUE: u64 = 50_000_000_000_000;

/// Hard cap on concurrent peers in the reference network
pub const MAX_PEERS: usize = 5;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_DB_PATH_KEY: &str = "NODE_DB_PATH";
const NODE_SEED_PEERS_KEY: &str = "NODE_SEED_PEERS";

/// Node settings, layered as defaults, optional TOML file, environment, CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen_address: String,
    pub seed_peers: Vec<String>,
    pub db_path: PathBuf,
    pub max_peers: usize,
    pub version: String,
    pub version_pattern: String,
    pub agent: String,
    pub coinbase_value: u64,
    pub genesis_id: String,
    pub connect_timeout_secs: u64,
    /// Whether `ihaveobject` announcements also go back to the peer that sent the object
    pub rebroadcast_to_sender: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            listen_address: DEFAULT_NODE_ADDR.to_string(),
            seed_peers: vec![],
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            max_peers: MAX_PEERS,
            version: DEFAULT_VERSION.to_string(),
            version_pattern: DEFAULT_VERSION_PATTERN.to_string(),
            agent: format!("penguin-node/{}", env!("CARGO_PKG_VERSION")),
            coinbase_value: COINBASE_VALUE,
            genesis_id: GENESIS_ID.to_string(),
            connect_timeout_secs: 10,
            rebroadcast_to_sender: true,
        }
    }
}

/// Constants the handshake and the validator depend on
#[derive(Debug, Clone)]
pub struct ProtocolParams {
    pub version: String,
    pub version_pattern: VersionPattern,
    pub agent: String,
    pub coinbase_value: u64,
    pub genesis_id: ObjectId,
}

impl Settings {
    /// Load settings from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Settings::default(),
        };
        settings.apply_overrides(|key| env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Settings> {
        let raw = fs::read_to_string(path).map_err(|e| {
            NodeError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Apply `NODE_ADDRESS`, `NODE_DB_PATH` and `NODE_SEED_PEERS` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.listen_address = addr;
        }
        if let Some(path) = lookup(NODE_DB_PATH_KEY) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(peers) = lookup(NODE_SEED_PEERS_KEY) {
            self.seed_peers = peers
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_peers == 0 {
            return Err(NodeError::Config("max_peers must be at least 1".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(NodeError::Config(
                "connect_timeout_secs must be at least 1".to_string(),
            ));
        }
        let params = self.protocol()?;
        if !params.version_pattern.matches(&params.version) {
            return Err(NodeError::Config(format!(
                "Own version {} does not satisfy pattern {}",
                params.version, params.version_pattern
            )));
        }
        Ok(())
    }

    pub fn protocol(&self) -> Result<ProtocolParams> {
        let version_pattern = self.version_pattern.parse()?;
        let genesis_id = ObjectId::parse(&self.genesis_id)
            .map_err(|e| NodeError::Config(format!("Invalid genesis_id: {e}")))?;
        Ok(ProtocolParams {
            version: self.version.clone(),
            version_pattern,
            agent: self.agent.clone(),
            coinbase_value: self.coinbase_value,
            genesis_id,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
