// Transactions follow a restricted UTXO model: a coinbase creates exactly one
// output of the protocol reward, every other transaction spends outputs of
// transactions that are already in the object store

use crate::core::{Object, ObjectId};
use crate::error::{NodeError, Result};
use crate::utils::canonicalize;
use serde::{Deserialize, Serialize};

/// Reference to output `index` of transaction `txid`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Outpoint {
    pub txid: ObjectId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TxInput {
    pub outpoint: Outpoint,
    /// Hex Ed25519 signature; `None` only in the signable form
    pub sig: Option<String>,
}

impl TxInput {
    pub fn new(txid: ObjectId, index: usize) -> TxInput {
        TxInput {
            outpoint: Outpoint { txid, index },
            sig: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TxOutput {
    /// Hex Ed25519 verify key allowed to spend this output
    pub pubkey: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<TxInput>>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    pub fn new_coinbase(height: u64, pubkey: &str, value: u64) -> Transaction {
        Transaction {
            height: Some(height),
            inputs: None,
            outputs: vec![TxOutput {
                pubkey: pubkey.to_string(),
                value,
            }],
        }
    }

    /// Build an unsigned spending transaction
    pub fn new_spend(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Transaction {
        Transaction {
            height: None,
            inputs: Some(inputs),
            outputs,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_none()
    }

    pub fn get_inputs(&self) -> &[TxInput] {
        self.inputs.as_deref().unwrap_or_default()
    }

    pub fn get_outputs(&self) -> &[TxOutput] {
        self.outputs.as_slice()
    }

    pub fn output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Copy of this transaction with every input signature nulled out
    pub fn without_signatures(&self) -> Transaction {
        let mut unsigned = self.clone();
        if let Some(inputs) = unsigned.inputs.as_mut() {
            for input in inputs.iter_mut() {
                input.sig = None;
            }
        }
        unsigned
    }

    /// The bytes every input signature commits to
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        canonicalize(&Object::Transaction(self.without_signatures()))
    }

    pub fn id(&self) -> Result<ObjectId> {
        Object::Transaction(self.clone()).id()
    }

    pub fn set_signature(&mut self, index: usize, sig_hex: String) -> Result<()> {
        let input = self
            .inputs
            .as_mut()
            .and_then(|inputs| inputs.get_mut(index))
            .ok_or_else(|| NodeError::Crypto(format!("Transaction has no input {index}")))?;
        input.sig = Some(sig_hex);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn txid(byte: char) -> ObjectId {
        ObjectId::parse(&byte.to_string().repeat(64)).unwrap()
    }

    #[test]
    fn test_coinbase_shape() {
        let tx = Transaction::new_coinbase(1, &"ab".repeat(32), 50);
        assert!(tx.is_coinbase());
        assert!(tx.get_inputs().is_empty());
        assert_eq!(tx.output_value(), Some(50));
    }

    #[test]
    fn test_signable_bytes_ignore_signatures() {
        let mut tx = Transaction::new_spend(
            vec![TxInput::new(txid('a'), 0)],
            vec![TxOutput {
                pubkey: "cd".repeat(32),
                value: 10,
            }],
        );
        let before = tx.signable_bytes().unwrap();
        tx.set_signature(0, "ef".repeat(64)).unwrap();
        assert_eq!(tx.signable_bytes().unwrap(), before);

        let text = String::from_utf8(before).unwrap();
        assert!(text.contains(r#""sig":null"#));
        assert!(text.contains(r#""type":"transaction""#));
    }

    #[test]
    fn test_output_value_overflow() {
        let tx = Transaction::new_spend(
            vec![],
            vec![
                TxOutput {
                    pubkey: "00".repeat(32),
                    value: u64::MAX,
                },
                TxOutput {
                    pubkey: "00".repeat(32),
                    value: 1,
                },
            ],
        );
        assert_eq!(tx.output_value(), None);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let raw = json!({
            "type": "transaction",
            "height": 1,
            "outputs": [],
            "memo": "extra"
        });
        assert!(Object::from_value(&raw).is_err());
    }

    #[test]
    fn test_set_signature_out_of_range() {
        let mut tx = Transaction::new_coinbase(0, &"ab".repeat(32), 1);
        assert!(tx.set_signature(0, String::new()).is_err());
    }
}
