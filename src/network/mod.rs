//! Peer-to-peer gossip networking
//!
//! Framing and the wire codec, the peer table and its transport, and the
//! gossip engine that drives the handshake and floods objects between peers.

pub mod connection;
pub mod framing;
pub mod message;
pub mod node;
pub mod peer_table;
pub mod server;
pub mod transport;

pub use connection::{Dialer, PeerEvent, TcpDialer};
pub use framing::{encode_frame, Frame, FrameBuffer, MAX_FRAME_LEN};
pub use message::{DecodeError, Message};
pub use node::Node;
pub use peer_table::{Direction, Handshake, Outbound, PeerLink, PeerTable};
pub use server::{open_store, Server};
pub use transport::{resolve, Transport};
