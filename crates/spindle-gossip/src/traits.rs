//! Collaborator contracts consumed by the engine.
//!
//! The engine calls [`GossipStore`], [`PeerSelector`] and [`NetworkSender`]
//! only from inside [`crate::ConsensusEngine::iterate`]. Transports feed the
//! engine through [`TransportObserver`].

use crate::error::Result;
use spindle_types::{GossipMessage, NodeId, Payload, StatusAck};

/// Owner of the gossiped application state.
///
/// `merge` stages a peer's data; exactly one of `commit` or `abort` then
/// terminates the session.
pub trait GossipStore: Send + Sync + 'static {
    /// Data to send when initiating a session.
    fn lead_payload(&self) -> Payload;

    /// Data to send when answering a session.
    fn follow_payload(&self) -> Payload;

    /// Absorbs a peer's data into pending local state.
    fn merge(&self, sender: &NodeId, payload: &Payload);

    /// Atomically applies pending state.
    fn commit(&self);

    /// Discards pending state.
    fn abort(&self);
}

/// Chooses gossip partners.
pub trait PeerSelector: Send + Sync + 'static {
    /// Picks a target for the next lead attempt.
    ///
    /// Returning the local node's own identity means no peer is eligible.
    fn choose_target(&self) -> NodeId;
}

/// Best-effort one-hop message delivery.
pub trait NetworkSender: Send + Sync + 'static {
    /// Sends a message to a peer. Fire-and-forget.
    fn send(&self, target: &NodeId, message: GossipMessage);
}

/// Receiver of decoded inbound traffic.
///
/// Implementations must be safe to call concurrently from many transport
/// tasks and must not block. An error means the entry was not accepted and
/// must not be acknowledged to the peer.
pub trait TransportObserver: Send + Sync + 'static {
    /// A protocol message arrived from `sender`.
    fn on_message(&self, sender: NodeId, message: GossipMessage) -> Result<()>;

    /// A status acknowledgement arrived from `sender`.
    fn on_status(&self, sender: NodeId, status: StatusAck) -> Result<()>;
}
