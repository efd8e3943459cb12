use crate::core::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A block as seen by the gossip core.
///
/// Only the genesis block is accepted, by id, so the header fields beyond the
/// transaction list and parent link are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub txids: Vec<ObjectId>,
    #[serde(default)]
    pub previd: Option<ObjectId>,
    #[serde(flatten)]
    pub header: Map<String, Value>,
}

impl Block {
    pub fn get_txids(&self) -> &[ObjectId] {
        self.txids.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Object;
    use serde_json::json;

    #[test]
    fn test_header_fields_survive() {
        let raw = json!({
            "type": "block",
            "txids": [],
            "previd": null,
            "nonce": "00",
            "created": 1671062400,
            "T": "00000000abc00000000000000000000000000000000000000000000000000000",
            "miner": "Marabu",
            "note": "genesis"
        });
        let object = Object::from_value(&raw).unwrap();
        let Object::Block(block) = &object else {
            panic!("expected a block");
        };
        assert!(block.previd.is_none());
        assert!(block.get_txids().is_empty());
        assert_eq!(object.id().unwrap(), ObjectId::of(&raw).unwrap());
    }
}
