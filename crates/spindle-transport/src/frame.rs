//! Wire frames.
//!
//! Every frame is a JSON document carried inside a 4-byte big-endian length
//! prefix. A connection opens with [`Frame::Hello`] from the dialing side;
//! after that the dialer sends [`Frame::Message`] and the listener answers
//! with [`Frame::Status`].

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use spindle_types::{GossipMessage, NodeId, StatusAck};
use tokio_util::codec::LengthDelimitedCodec;

/// Largest frame either side accepts.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// A single unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum Frame {
    /// First frame on every connection, naming the dialing node.
    Hello {
        /// Identity of the dialer.
        node_id: NodeId,
    },
    /// A protocol message for the receiving engine.
    Message(GossipMessage),
    /// Delivery acknowledgement for a previously sent message.
    Status(StatusAck),
}

impl Frame {
    /// Encodes the frame body.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decodes a frame body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Returns the frame type as a string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::Message(message) => message.kind(),
            Frame::Status(_) => "status",
        }
    }
}

/// Length-prefixed codec used on every connection.
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}
