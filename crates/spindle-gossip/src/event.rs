//! Events and counters emitted by the engine.

use crate::state::Role;
use spindle_types::{NodeId, SessionId};

/// Why a session ended in abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A matching status ack reported a failed delivery.
    BadStatus,
    /// The target answered the lead with a rejection.
    Rejected,
}

/// Events emitted by the gossip engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GossipEvent {
    /// The node left idle.
    SessionStarted {
        /// Which side of the session this node is on.
        role: Role,
        /// The session partner.
        peer: NodeId,
        /// The session.
        session: SessionId,
    },
    /// The session committed merged state.
    SessionCommitted {
        /// Which side of the session this node was on.
        role: Role,
        /// The session partner.
        peer: NodeId,
        /// The session.
        session: SessionId,
    },
    /// The session aborted.
    SessionAborted {
        /// Which side of the session this node was on.
        role: Role,
        /// The session partner.
        peer: NodeId,
        /// The session.
        session: SessionId,
        /// What ended it.
        reason: AbortReason,
    },
    /// The node rejected a peer's lead attempt.
    LeadRejected {
        /// The rejected leader.
        peer: NodeId,
        /// The rejected session.
        session: SessionId,
    },
    /// An entry was dropped without effect.
    Discarded {
        /// Sender of the dropped entry.
        peer: NodeId,
        /// Message or status kind, for logs.
        kind: &'static str,
    },
}

/// Running totals kept by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Lead messages sent.
    pub leads_sent: u64,
    /// Lead messages answered with a follow response.
    pub follows: u64,
    /// Sessions committed.
    pub commits: u64,
    /// Sessions aborted.
    pub aborts: u64,
    /// Rejections sent.
    pub rejections_sent: u64,
    /// Entries discarded without effect.
    pub discarded: u64,
    /// Lead attempts skipped because no peer was eligible.
    pub self_target_skips: u64,
}
