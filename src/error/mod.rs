//! Error handling for the node
//!
//! Transport, framing, persistence and configuration failures all surface as
//! [`NodeError`]. Validation verdicts are not errors; see `core::validation`.

use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Error types for node operations
#[derive(Debug, Clone)]
pub enum NodeError {
    /// Persistence collaborator errors
    Database(String),
    /// Key handling and signature errors
    Crypto(String),
    /// Socket level errors (connect, read, write, bind)
    Network(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Configuration errors
    Config(String),
    /// Peer address that cannot be parsed or resolved
    InvalidAddress(String),
    /// Outbound frame exceeds the wire limit
    FrameTooLarge { size: usize, max: usize },
    /// Peer table is full
    PeerLimit { max: usize },
    /// A session with this address already exists
    DuplicatePeer(String),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Database(msg) => write!(f, "Database error: {msg}"),
            NodeError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            NodeError::Network(msg) => write!(f, "Network error: {msg}"),
            NodeError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            NodeError::Io(msg) => write!(f, "I/O error: {msg}"),
            NodeError::Config(msg) => write!(f, "Configuration error: {msg}"),
            NodeError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            NodeError::FrameTooLarge { size, max } => {
                write!(f, "Frame too large: {size} bytes exceeds limit of {max}")
            }
            NodeError::PeerLimit { max } => write!(f, "Peer limit of {max} reached"),
            NodeError::DuplicatePeer(addr) => write!(f, "Peer {addr} already connected"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::Io(err.to_string())
    }
}

impl From<sled::Error> for NodeError {
    fn from(err: sled::Error) -> Self {
        NodeError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for NodeError {
    fn from(err: toml::de::Error) -> Self {
        NodeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_too_large_display() {
        let err = NodeError::FrameTooLarge {
            size: 5000,
            max: 4096,
        };
        assert_eq!(
            err.to_string(),
            "Frame too large: 5000 bytes exceeds limit of 4096"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: NodeError = io.into();
        assert!(matches!(err, NodeError::Io(_)));
    }
}
