// Content-addressed objects: everything gossiped between nodes is either a
// transaction or a block, identified by the SHA-256 of its canonical encoding

use crate::core::{Block, Transaction};
use crate::error::{NodeError, Result};
use crate::utils::{canonicalize_value, sha256_hex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const OBJECT_ID_LEN: usize = 64;

/// Lowercase hex SHA-256 of an object's canonical encoding
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Accept only 64 lowercase hex characters
    pub fn parse(raw: &str) -> Result<ObjectId> {
        let well_formed = raw.len() == OBJECT_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(NodeError::Serialization(format!(
                "Object id must be {OBJECT_ID_LEN} lowercase hex characters, got '{raw}'"
            )));
        }
        Ok(ObjectId(raw.to_string()))
    }

    /// Compute the id of a raw JSON object
    pub fn of(value: &Value) -> Result<ObjectId> {
        let bytes = canonicalize_value(value)?;
        Ok(ObjectId(sha256_hex(&bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectId {
    type Error = NodeError;

    fn try_from(raw: String) -> Result<Self> {
        ObjectId::parse(&raw)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed view of a gossiped object, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Object {
    Transaction(Transaction),
    Block(Block),
}

impl Object {
    pub fn from_value(value: &Value) -> Result<Object> {
        Object::deserialize(value)
            .map_err(|e| NodeError::Serialization(format!("Malformed object: {e}")))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn id(&self) -> Result<ObjectId> {
        ObjectId::of(&self.to_value()?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Object::Transaction(_) => "transaction",
            Object::Block(_) => "block",
        }
    }
}
