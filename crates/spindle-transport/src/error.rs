//! Transport error types.

use spindle_types::NodeId;
use thiserror::Error;

/// Errors that can occur while moving frames between nodes.
///
/// None of these reach the gossip engine. A failed delivery surfaces there
/// only as a bad status or as silence from the peer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error, including oversized frames.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The connection did not open with a valid hello.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// No address is known for the peer.
    #[error("unknown peer: {0}")]
    UnknownPeer(NodeId),

    /// The local engine no longer accepts inbound traffic.
    #[error(transparent)]
    Gossip(#[from] spindle_gossip::GossipError),
}

/// A specialized Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
