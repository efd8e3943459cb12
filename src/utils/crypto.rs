use data_encoding::HEXLOWER;
use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};

use crate::error::{NodeError, Result};

/// Length of an Ed25519 verify key in bytes
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature in bytes
pub const SIGNATURE_LEN: usize = 64;

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// SHA-256 of `data` as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&sha256_digest(data))
}

/// Decode a lowercase hex string, rejecting anything else
pub fn decode_hex(data: &str) -> Result<Vec<u8>> {
    HEXLOWER
        .decode(data.as_bytes())
        .map_err(|e| NodeError::Serialization(format!("Invalid hex string: {e}")))
}

pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
        .map_err(|e| NodeError::Crypto(format!("Failed to generate Ed25519 key pair: {e}")))?
        .as_ref()
        .to_vec();
    Ok(pkcs8)
}

pub fn ed25519_public_key(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8)
        .map_err(|e| NodeError::Crypto(format!("Failed to load key pair from PKCS8: {e}")))?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

pub fn ed25519_sign(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8)
        .map_err(|e| NodeError::Crypto(format!("Failed to load key pair from PKCS8: {e}")))?;
    Ok(key_pair.sign(message).as_ref().to_vec())
}

pub fn ed25519_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key = UnparsedPublicKey::new(&ED25519, public_key);
    peer_public_key.verify(message, signature).is_ok()
}
