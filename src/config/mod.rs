//! Configuration management
//!
//! This module resolves the listen address, seed peers, storage location and
//! protocol constants before the node is constructed.

pub mod settings;
pub mod version;

pub use settings::{ProtocolParams, Settings, COINBASE_VALUE, GENESIS_ID, MAX_PEERS};
pub use version::VersionPattern;
