use crate::core::Transaction;
use crate::error::{NodeError, Result};
use crate::utils::{decode_hex, ed25519_public_key, ed25519_sign, new_key_pair};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// An Ed25519 signing key; the PKCS#8 document is wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    #[zeroize(skip)]
    public_key: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct KeyFile {
    pkcs8: String,
    pubkey: String,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        Self::from_pkcs8(new_key_pair()?)
    }

    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Wallet> {
        let public_key = ed25519_public_key(&pkcs8)?;
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    /// Verify key as it appears in transaction outputs
    pub fn public_key_hex(&self) -> String {
        HEXLOWER.encode(&self.public_key)
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        ed25519_sign(&self.pkcs8, message)
    }

    /// Sign every input of `tx` with this key
    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<()> {
        let message = tx.signable_bytes()?;
        let signature = HEXLOWER.encode(&self.sign(&message)?);
        for index in 0..tx.get_inputs().len() {
            tx.set_signature(index, signature.clone())?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = KeyFile {
            pkcs8: HEXLOWER.encode(&self.pkcs8),
            pubkey: self.public_key_hex(),
        };
        let encoded = serde_json::to_string_pretty(&file).map(Zeroizing::new);
        file.pkcs8.zeroize();
        let encoded = encoded?;
        fs::write(path, encoded.as_bytes())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Wallet> {
        let raw = Zeroizing::new(fs::read_to_string(path)?);
        let mut file: KeyFile = serde_json::from_str(&raw)?;
        let pkcs8 = decode_hex(&file.pkcs8);
        file.pkcs8.zeroize();
        let wallet = Self::from_pkcs8(pkcs8?)?;
        if wallet.public_key_hex() != file.pubkey {
            return Err(NodeError::Crypto(format!(
                "Key file {} public key does not match its private key",
                path.display()
            )));
        }
        Ok(wallet)
    }
}
