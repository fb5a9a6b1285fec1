//! Protocol messages exchanged between peers during a gossip session.
//!
//! A session has two roles. The leader proposes with a [`LeadGossipMessage`];
//! the follower answers with a [`FollowResponse`]. A node that is already
//! engaged elsewhere rejects a proposal with a [`NoGossipResponse`].
//! Delivery acknowledgements travel separately as [`StatusAck`].

use crate::SessionId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque application data carried by a gossip session.
///
/// Only the gossip data store knows how to interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload(Bytes);

impl Payload {
    /// Creates a payload from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the payload carries no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}

/// Proposal sent by an initiator to open a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadGossipMessage {
    /// Session minted by the leader.
    pub session_id: SessionId,
    /// Leader's data.
    pub payload: Payload,
}

impl LeadGossipMessage {
    /// Creates a lead message for a freshly minted session.
    pub fn new(payload: Payload) -> Self {
        Self {
            session_id: SessionId::new(),
            payload,
        }
    }
}

/// Follower's answer to a [`LeadGossipMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowResponse {
    /// Session being answered.
    pub session_id: SessionId,
    /// Follower's data.
    pub payload: Payload,
}

/// Rejection of a lead attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoGossipResponse {
    /// Session being rejected.
    pub session_id: SessionId,
}

/// Protocol messages delivered on the message queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GossipMessage {
    /// Session proposal.
    Lead(LeadGossipMessage),
    /// Session answer.
    Follow(FollowResponse),
    /// Session rejection.
    NoGossip(NoGossipResponse),
}

impl GossipMessage {
    /// Returns the session this message belongs to.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        match self {
            GossipMessage::Lead(m) => m.session_id,
            GossipMessage::Follow(m) => m.session_id,
            GossipMessage::NoGossip(m) => m.session_id,
        }
    }

    /// Returns the message type as a string for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GossipMessage::Lead(_) => "lead",
            GossipMessage::Follow(_) => "follow",
            GossipMessage::NoGossip(_) => "no_gossip",
        }
    }

    /// Returns true if the receiving transport should acknowledge this message.
    ///
    /// Only session-opening and session-answering messages are awaited by a
    /// status ack; rejections are not.
    #[must_use]
    pub fn expects_ack(&self) -> bool {
        !matches!(self, GossipMessage::NoGossip(_))
    }
}

impl From<LeadGossipMessage> for GossipMessage {
    fn from(value: LeadGossipMessage) -> Self {
        GossipMessage::Lead(value)
    }
}

impl From<FollowResponse> for GossipMessage {
    fn from(value: FollowResponse) -> Self {
        GossipMessage::Follow(value)
    }
}

impl From<NoGossipResponse> for GossipMessage {
    fn from(value: NoGossipResponse) -> Self {
        GossipMessage::NoGossip(value)
    }
}

impl fmt::Display for GossipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.session_id().short())
    }
}

/// Outcome carried by a [`StatusAck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The correlated message was delivered and processed by the peer.
    Good,
    /// The correlated message could not be delivered.
    Bad,
}

/// Lightweight acknowledgement delivered on the status queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAck {
    /// Session of the acknowledged message.
    pub session_id: SessionId,
    /// Delivery outcome.
    pub outcome: Outcome,
}

impl StatusAck {
    /// Positive acknowledgement.
    #[must_use]
    pub const fn good(session_id: SessionId) -> Self {
        Self {
            session_id,
            outcome: Outcome::Good,
        }
    }

    /// Negative acknowledgement.
    #[must_use]
    pub const fn bad(session_id: SessionId) -> Self {
        Self {
            session_id,
            outcome: Outcome::Bad,
        }
    }
}
