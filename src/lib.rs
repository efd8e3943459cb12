//! # Penguin Node - My Gossip Node for a Toy Cryptocurrency
//!
//! This is a small peer-to-peer node that I built to learn how flood gossip
//! and a UTXO validator fit together. When I come back to this code, here's
//! what I need to remember:
//!
//! ## What I Built
//! - **Content-Addressed Objects**: every transaction and block is named by the
//!   SHA-256 of its canonical JSON encoding
//! - **UTXO Validation**: Ed25519 signatures, conservation of value and a fixed
//!   coinbase reward, with unknown inputs deferred instead of rejected
//! - **Gossip Protocol**: newline-delimited JSON over TCP with a hello handshake,
//!   peer discovery and `ihaveobject`/`getobject` flooding
//! - **Peer Limits**: at most five peers, checked before any socket is opened
//!
//! ## How I Organized My Code
//! - `core/`: objects, ids, transactions and the validator
//! - `network/`: framing, messages, the peer table and the gossip engine
//! - `storage/`: the sled key-value store, object store, peer book and mempool
//! - `wallet/`: Ed25519 key files and transaction signing
//! - `config/`: layered settings and protocol constants
//! - `utils/`: canonical encoding and crypto helpers
//! - `cli/`: command-line parsing
//!
//! ## When I Need to Understand Something
//! 1. Start with `network/node.rs` to see how every message is handled
//! 2. Look at `core/validation.rs` for what makes an object acceptable
//! 3. Check `network/connection.rs` for the per-peer threads
//! 4. Review `utils/canonical.rs` for how ids are computed

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{ProtocolParams, Settings, COINBASE_VALUE, GENESIS_ID};
pub use core::{
    validate_block, validate_object, validate_transaction, Block, Object, ObjectId,
    ObjectOutcome, Transaction, TransactionOutcome, TxInput, TxOutput,
};
pub use error::{NodeError, Result};
pub use network::{Message, Node, PeerTable, Server, Transport};
pub use storage::{KeyValueStore, MemoryPool, MemoryStore, ObjectStore, PeerBook, SledStore};
pub use utils::{canonicalize, canonicalize_value, sha256_hex};
pub use wallet::Wallet;
