//! Utility functions and helpers
//!
//! Canonical encoding, hashing and Ed25519 primitives shared by the
//! validator, the wire codec and the wallet.

pub mod canonical;
pub mod crypto;

pub use canonical::{canonicalize, canonicalize_value};
pub use crypto::{
    decode_hex, ed25519_public_key, ed25519_sign, ed25519_verify, new_key_pair, sha256_digest,
    sha256_hex, PUBLIC_KEY_LEN, SIGNATURE_LEN,
};
