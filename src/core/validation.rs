// Validation decides what happens to an object a peer hands us. The verdicts
// are deliberately not errors: a rejected object is answered with an `error`
// message, a deferred one is dropped quietly, and neither ends the session.

use crate::config::ProtocolParams;
use crate::core::{Block, Object, ObjectId, Transaction, TxOutput};
use crate::error::Result;
use crate::storage::ObjectStore;
use crate::utils::{decode_hex, ed25519_verify, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Valid,
    /// Signature of input `input` does not verify against the spent output's key
    InvalidSignature { input: usize },
    /// Outputs spend more than the referenced inputs provide
    InvalidConservation { inputs: u64, outputs: u64 },
    /// An outpoint names a transaction we have not seen yet
    MissingDependency(ObjectId),
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Valid,
    Invalid(String),
}

/// What kind of object was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Coinbase,
    Transaction,
    Block,
}

/// Verdict on an inbound object, with the three handling paths kept apart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOutcome {
    /// Store it and announce it
    Accept { id: ObjectId, kind: ObjectKind },
    /// Drop it silently; it may validate once `missing` arrives
    Defer { id: ObjectId, missing: ObjectId },
    /// Tell the sender why and drop it
    Reject { id: ObjectId, reason: String },
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionOutcome::Valid => write!(f, "valid"),
            TransactionOutcome::InvalidSignature { input } => {
                write!(f, "invalid signature on input {input}")
            }
            TransactionOutcome::InvalidConservation { inputs, outputs } => write!(
                f,
                "outputs worth {outputs} exceed inputs worth {inputs}"
            ),
            TransactionOutcome::MissingDependency(txid) => {
                write!(f, "unknown transaction {txid}")
            }
            TransactionOutcome::Malformed(reason) => write!(f, "malformed transaction: {reason}"),
        }
    }
}

pub fn validate_transaction(
    tx: &Transaction,
    store: &ObjectStore,
    params: &ProtocolParams,
) -> Result<TransactionOutcome> {
    for (index, output) in tx.get_outputs().iter().enumerate() {
        if decode_key(output).is_none() {
            return Ok(TransactionOutcome::Malformed(format!(
                "output {index} pubkey is not a {PUBLIC_KEY_LEN}-byte hex key"
            )));
        }
    }

    let Some(inputs) = tx.inputs.as_ref() else {
        return Ok(validate_coinbase(tx, params));
    };
    if tx.height.is_some() {
        return Ok(TransactionOutcome::Malformed(
            "transaction carries both height and inputs".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut spent: Vec<TxOutput> = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        if !seen.insert(&input.outpoint) {
            return Ok(TransactionOutcome::Malformed(format!(
                "input {index} spends an outpoint twice"
            )));
        }
        let Some(raw) = store.get(&input.outpoint.txid)? else {
            return Ok(TransactionOutcome::MissingDependency(
                input.outpoint.txid.clone(),
            ));
        };
        let funding = match Object::from_value(&raw) {
            Ok(Object::Transaction(funding)) => funding,
            _ => {
                return Ok(TransactionOutcome::Malformed(format!(
                    "input {index} does not reference a transaction"
                )))
            }
        };
        match funding.get_outputs().get(input.outpoint.index) {
            Some(output) => spent.push(output.clone()),
            None => {
                return Ok(TransactionOutcome::Malformed(format!(
                    "input {index} references missing output {}",
                    input.outpoint.index
                )))
            }
        }
    }

    let message = tx.signable_bytes()?;
    for (index, (input, output)) in inputs.iter().zip(spent.iter()).enumerate() {
        let signature = match input.sig.as_deref().map(decode_hex) {
            Some(Ok(sig)) if sig.len() == SIGNATURE_LEN => sig,
            _ => {
                return Ok(TransactionOutcome::Malformed(format!(
                    "input {index} signature is not a {SIGNATURE_LEN}-byte hex signature"
                )))
            }
        };
        let Some(public_key) = decode_key(output) else {
            return Ok(TransactionOutcome::InvalidSignature { input: index });
        };
        if !ed25519_verify(&public_key, &signature, &message) {
            return Ok(TransactionOutcome::InvalidSignature { input: index });
        }
    }

    let input_value = spent
        .iter()
        .try_fold(0u64, |acc, out| acc.checked_add(out.value));
    let (Some(input_value), Some(output_value)) = (input_value, tx.output_value()) else {
        return Ok(TransactionOutcome::Malformed("value overflow".to_string()));
    };
    if input_value < output_value {
        return Ok(TransactionOutcome::InvalidConservation {
            inputs: input_value,
            outputs: output_value,
        });
    }

    Ok(TransactionOutcome::Valid)
}

fn validate_coinbase(tx: &Transaction, params: &ProtocolParams) -> TransactionOutcome {
    match tx.get_outputs() {
        [output] if output.value == params.coinbase_value => TransactionOutcome::Valid,
        [output] => TransactionOutcome::Malformed(format!(
            "coinbase pays {} instead of {}",
            output.value, params.coinbase_value
        )),
        outputs => TransactionOutcome::Malformed(format!(
            "coinbase has {} outputs instead of 1",
            outputs.len()
        )),
    }
}

fn decode_key(output: &TxOutput) -> Option<Vec<u8>> {
    decode_hex(&output.pubkey)
        .ok()
        .filter(|key| key.len() == PUBLIC_KEY_LEN)
}

/// Only the configured genesis block is accepted until chain validation exists
pub fn validate_block(id: &ObjectId, block: &Block, params: &ProtocolParams) -> BlockOutcome {
    if *id == params.genesis_id {
        return BlockOutcome::Valid;
    }
    BlockOutcome::Invalid(format!(
        "block {id} with {} txids is not the genesis block",
        block.get_txids().len()
    ))
}

/// Classify a raw object received from a peer
pub fn validate_object(
    raw: &Value,
    store: &ObjectStore,
    params: &ProtocolParams,
) -> Result<ObjectOutcome> {
    let id = ObjectId::of(raw)?;
    let object = match Object::from_value(raw) {
        Ok(object) => object,
        Err(e) => {
            return Ok(ObjectOutcome::Reject {
                id,
                reason: e.to_string(),
            })
        }
    };

    let outcome = match &object {
        Object::Transaction(tx) => match validate_transaction(tx, store, params)? {
            TransactionOutcome::Valid => {
                let kind = if tx.is_coinbase() {
                    ObjectKind::Coinbase
                } else {
                    ObjectKind::Transaction
                };
                ObjectOutcome::Accept { id, kind }
            }
            TransactionOutcome::MissingDependency(missing) => {
                ObjectOutcome::Defer { id, missing }
            }
            rejected => ObjectOutcome::Reject {
                id,
                reason: rejected.to_string(),
            },
        },
        Object::Block(block) => match validate_block(&id, block, params) {
            BlockOutcome::Valid => ObjectOutcome::Accept {
                id,
                kind: ObjectKind::Block,
            },
            BlockOutcome::Invalid(reason) => ObjectOutcome::Reject { id, reason },
        },
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::TxInput;
    use crate::storage::MemoryStore;
    use crate::wallet::Wallet;
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (ObjectStore, ProtocolParams) {
        let store = ObjectStore::new(Arc::new(MemoryStore::new()));
        let params = Settings::default().protocol().unwrap();
        (store, params)
    }

    fn store_tx(store: &ObjectStore, tx: &Transaction) -> ObjectId {
        let raw = Object::Transaction(tx.clone()).to_value().unwrap();
        let id = ObjectId::of(&raw).unwrap();
        store.put(&id, &raw).unwrap();
        id
    }

    fn fund(store: &ObjectStore, wallet: &Wallet, params: &ProtocolParams) -> ObjectId {
        let coinbase = Transaction::new_coinbase(1, &wallet.public_key_hex(), params.coinbase_value);
        store_tx(store, &coinbase)
    }

    fn spend(wallet: &Wallet, txid: ObjectId, values: &[u64]) -> Transaction {
        let outputs = values
            .iter()
            .map(|value| TxOutput {
                pubkey: wallet.public_key_hex(),
                value: *value,
            })
            .collect();
        let mut tx = Transaction::new_spend(vec![TxInput::new(txid, 0)], outputs);
        wallet.sign_transaction(&mut tx).unwrap();
        tx
    }

    #[test]
    fn test_coinbase_value_must_match() {
        let (store, params) = setup();
        let key = "ab".repeat(32);

        let good = Transaction::new_coinbase(1, &key, params.coinbase_value);
        assert_eq!(
            validate_transaction(&good, &store, &params).unwrap(),
            TransactionOutcome::Valid
        );

        let bad = Transaction::new_coinbase(1, &key, params.coinbase_value - 1);
        assert!(matches!(
            validate_transaction(&bad, &store, &params).unwrap(),
            TransactionOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_coinbase_needs_exactly_one_output() {
        let (store, params) = setup();
        let mut tx = Transaction::new_coinbase(1, &"ab".repeat(32), params.coinbase_value);
        tx.outputs.push(tx.outputs[0].clone());
        assert!(matches!(
            validate_transaction(&tx, &store, &params).unwrap(),
            TransactionOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_spend_within_funds_is_valid() {
        let (store, params) = setup();
        let wallet = Wallet::new().unwrap();
        let funding = fund(&store, &wallet, &params);

        let exact = spend(&wallet, funding.clone(), &[params.coinbase_value]);
        assert_eq!(
            validate_transaction(&exact, &store, &params).unwrap(),
            TransactionOutcome::Valid
        );

        let with_fee = spend(&wallet, funding, &[10, 20]);
        assert_eq!(
            validate_transaction(&with_fee, &store, &params).unwrap(),
            TransactionOutcome::Valid
        );
    }

    #[test]
    fn test_spend_creating_value_breaks_conservation() {
        let (store, params) = setup();
        let wallet = Wallet::new().unwrap();
        let funding = fund(&store, &wallet, &params);

        let tx = spend(&wallet, funding, &[params.coinbase_value, 1]);
        assert_eq!(
            validate_transaction(&tx, &store, &params).unwrap(),
            TransactionOutcome::InvalidConservation {
                inputs: params.coinbase_value,
                outputs: params.coinbase_value + 1,
            }
        );
    }

    #[test]
    fn test_tampered_signature_fails() {
        let (store, params) = setup();
        let wallet = Wallet::new().unwrap();
        let funding = fund(&store, &wallet, &params);
        let mut tx = spend(&wallet, funding, &[5]);

        let sig = tx.get_inputs()[0].sig.clone().unwrap();
        let mut bytes = decode_hex(&sig).unwrap();
        bytes[10] ^= 0x01;
        tx.set_signature(0, data_encoding::HEXLOWER.encode(&bytes))
            .unwrap();

        assert_eq!(
            validate_transaction(&tx, &store, &params).unwrap(),
            TransactionOutcome::InvalidSignature { input: 0 }
        );
    }

    #[test]
    fn test_signature_from_wrong_key_fails() {
        let (store, params) = setup();
        let owner = Wallet::new().unwrap();
        let thief = Wallet::new().unwrap();
        let funding = fund(&store, &owner, &params);

        let tx = spend(&thief, funding, &[5]);
        assert_eq!(
            validate_transaction(&tx, &store, &params).unwrap(),
            TransactionOutcome::InvalidSignature { input: 0 }
        );
    }

    #[test]
    fn test_tampered_output_invalidates_signature() {
        let (store, params) = setup();
        let wallet = Wallet::new().unwrap();
        let funding = fund(&store, &wallet, &params);
        let mut tx = spend(&wallet, funding, &[5]);
        tx.outputs[0].value = 6;

        assert_eq!(
            validate_transaction(&tx, &store, &params).unwrap(),
            TransactionOutcome::InvalidSignature { input: 0 }
        );
    }

    #[test]
    fn test_missing_dependency_is_deferred() {
        let (store, params) = setup();
        let wallet = Wallet::new().unwrap();
        let unknown = ObjectId::parse(&"9".repeat(64)).unwrap();
        let tx = spend(&wallet, unknown.clone(), &[5]);

        assert_eq!(
            validate_transaction(&tx, &store, &params).unwrap(),
            TransactionOutcome::MissingDependency(unknown.clone())
        );

        let raw = Object::Transaction(tx).to_value().unwrap();
        let outcome = validate_object(&raw, &store, &params).unwrap();
        assert!(matches!(outcome, ObjectOutcome::Defer { missing, .. } if missing == unknown));
    }

    #[test]
    fn test_output_index_out_of_range() {
        let (store, params) = setup();
        let wallet = Wallet::new().unwrap();
        let funding = fund(&store, &wallet, &params);
        let mut tx = Transaction::new_spend(
            vec![TxInput::new(funding, 3)],
            vec![TxOutput {
                pubkey: wallet.public_key_hex(),
                value: 1,
            }],
        );
        wallet.sign_transaction(&mut tx).unwrap();
        assert!(matches!(
            validate_transaction(&tx, &store, &params).unwrap(),
            TransactionOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_double_spend_within_transaction() {
        let (store, params) = setup();
        let wallet = Wallet::new().unwrap();
        let funding = fund(&store, &wallet, &params);
        let mut tx = Transaction::new_spend(
            vec![
                TxInput::new(funding.clone(), 0),
                TxInput::new(funding, 0),
            ],
            vec![TxOutput {
                pubkey: wallet.public_key_hex(),
                value: params.coinbase_value * 2,
            }],
        );
        wallet.sign_transaction(&mut tx).unwrap();
        assert!(matches!(
            validate_transaction(&tx, &store, &params).unwrap(),
            TransactionOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_bad_output_key_is_malformed() {
        let (store, params) = setup();
        let tx = Transaction::new_coinbase(1, "not-a-key", params.coinbase_value);
        assert!(matches!(
            validate_transaction(&tx, &store, &params).unwrap(),
            TransactionOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_only_genesis_block_is_valid() {
        let (store, params) = setup();
        let raw = json!({"type": "block", "txids": [], "previd": null, "note": "not genesis"});
        let outcome = validate_object(&raw, &store, &params).unwrap();
        assert!(matches!(outcome, ObjectOutcome::Reject { .. }));

        let block = Block {
            txids: vec![],
            previd: None,
            header: serde_json::Map::new(),
        };
        assert_eq!(
            validate_block(&params.genesis_id, &block, &params),
            BlockOutcome::Valid
        );
    }

    #[test]
    fn test_validate_object_accepts_coinbase() {
        let (store, params) = setup();
        let raw = json!({
            "type": "transaction",
            "height": 0,
            "outputs": [{"pubkey": "ab".repeat(32), "value": params.coinbase_value}],
        });
        let outcome = validate_object(&raw, &store, &params).unwrap();
        assert_eq!(
            outcome,
            ObjectOutcome::Accept {
                id: ObjectId::of(&raw).unwrap(),
                kind: ObjectKind::Coinbase,
            }
        );
    }

    #[test]
    fn test_validate_object_rejects_garbage() {
        let (store, params) = setup();
        let raw = json!({"type": "transaction", "outputs": "nope"});
        assert!(matches!(
            validate_object(&raw, &store, &params).unwrap(),
            ObjectOutcome::Reject { .. }
        ));
    }
}
