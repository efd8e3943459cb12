//! Key management
//!
//! Ed25519 keys used to lock transaction outputs and sign spending inputs.

#[allow(clippy::module_inception)]
pub mod wallet;

pub use wallet::Wallet;
