use crate::core::ObjectId;
use crate::error::Result;
use crate::network::framing::encode_frame;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const KNOWN_TYPES: [&str; 11] = [
    "hello",
    "getpeers",
    "peers",
    "getobject",
    "ihaveobject",
    "object",
    "getmempool",
    "mempool",
    "getchaintip",
    "chaintip",
    "error",
];

/// Gossip protocol messages, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Hello {
        version: String,
        agent: String,
    },
    GetPeers,
    Peers {
        peers: Vec<String>,
    },
    GetObject {
        objectid: ObjectId,
    },
    IHaveObject {
        objectid: ObjectId,
    },
    Object {
        object: Value,
    },
    GetMempool,
    Mempool {
        txids: Vec<ObjectId>,
    },
    GetChainTip,
    ChainTip {
        blockid: ObjectId,
    },
    Error {
        error: String,
    },
}

/// Why an inbound frame could not be turned into a [`Message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not JSON at all
    Json(String),
    /// Valid JSON with a `type` this node does not speak
    UnknownType(String),
    /// A known `type` with missing or mis-shaped fields
    Malformed { kind: String, reason: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(reason) => write!(f, "Invalid JSON: {reason}"),
            DecodeError::UnknownType(kind) => write!(f, "Unknown message type: {kind}"),
            DecodeError::Malformed { kind, reason } if kind.is_empty() => {
                write!(f, "Malformed message: {reason}")
            }
            DecodeError::Malformed { kind, reason } => {
                write!(f, "Malformed {kind} message: {reason}")
            }
        }
    }
}

impl Message {
    pub fn decode(frame: &[u8]) -> std::result::Result<Message, DecodeError> {
        let value: Value =
            serde_json::from_slice(frame).map_err(|e| DecodeError::Json(e.to_string()))?;
        let kind = match value.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_string(),
            None => {
                return Err(DecodeError::Malformed {
                    kind: String::new(),
                    reason: "missing string field 'type'".to_string(),
                })
            }
        };
        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(DecodeError::UnknownType(kind));
        }
        Message::deserialize(value).map_err(|e| DecodeError::Malformed {
            kind,
            reason: e.to_string(),
        })
    }

    /// Canonical bytes plus the newline delimiter
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_frame(self)
    }

    pub fn error(reason: impl Into<String>) -> Message {
        Message::Error {
            error: reason.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "hello",
            Message::GetPeers => "getpeers",
            Message::Peers { .. } => "peers",
            Message::GetObject { .. } => "getobject",
            Message::IHaveObject { .. } => "ihaveobject",
            Message::Object { .. } => "object",
            Message::GetMempool => "getmempool",
            Message::Mempool { .. } => "mempool",
            Message::GetChainTip => "getchaintip",
            Message::ChainTip { .. } => "chaintip",
            Message::Error { .. } => "error",
        }
    }
}
