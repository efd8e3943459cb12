//! Data storage and persistence
//!
//! The content-addressed object store and the known-peers book, both on top
//! of a pluggable durable key-value store, plus the in-memory mempool.

pub mod kv;
pub mod memory_pool;
pub mod object_store;
pub mod peer_book;

pub use kv::{KeyValueStore, MemoryStore, SledStore};
pub use memory_pool::MemoryPool;
pub use object_store::ObjectStore;
pub use peer_book::PeerBook;
