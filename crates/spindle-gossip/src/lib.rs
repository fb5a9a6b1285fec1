//! Spindle Gossip Engine
//!
//! Pairwise anti-entropy sessions between vehicular nodes. Each node runs one
//! [`ConsensusEngine`]: a sequential state machine that initiates sessions
//! with a randomly chosen peer, answers sessions initiated by others, and
//! commits or aborts merged state once both sides have heard from each other.
//!
//! # Components
//!
//! - [`ConsensusEngine`]: the session state machine, stepped by
//!   [`ConsensusEngine::iterate`] and driven by [`ConsensusEngine::run`]
//! - [`EngineHandle`]: the producer side of the engine's message and status
//!   queues, handed to transports
//! - [`Control`]: sticky lead and stop flags
//! - [`GossipStore`], [`PeerSelector`], [`NetworkSender`]: collaborators the
//!   engine calls into
//! - [`LwwStore`], [`RandomPeerSelector`]: stock collaborator implementations
//!
//! # Session Flow
//!
//! ```text
//!        Leader (A)                                  Follower (B)
//!  ┌──────────────────┐      LeadGossip(s, pA)   ┌──────────────────┐
//!  │ Idle             │─────────────────────────▶│ Idle             │
//!  │  lead flag set   │                          │  merge(pA)       │
//!  └────────┬─────────┘      FollowResponse(s,pB)└────────┬─────────┘
//!           │            ◀────────────────────────────────┤
//!           ▼                                             ▼
//!  ┌──────────────────┐                          ┌──────────────────┐
//!  │ WaitStatus(s)    │  delivery status(s)      │ Following(s)     │
//!  │  GOOD ─▶ Wait-   │  from own transport      │  GOOD ─▶ commit  │
//!  │  Response(s)     │                          │  BAD  ─▶ abort   │
//!  └────────┬─────────┘                          └──────────────────┘
//!           ▼
//!  ┌──────────────────┐
//!  │ WaitResponse(s)  │
//!  │  follow ─▶ merge │
//!  │          commit  │
//!  │  no-gossip ─▶    │
//!  │          abort   │
//!  └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use spindle_gossip::{
//!     Collaborators, ConsensusEngine, EngineConfig, LwwStore, NetworkSender,
//!     RandomPeerSelector,
//! };
//! use spindle_types::{GossipMessage, NodeId};
//! use std::sync::Arc;
//!
//! struct Discard;
//! impl NetworkSender for Discard {
//!     fn send(&self, _target: &NodeId, _message: GossipMessage) {}
//! }
//!
//! let id = NodeId::new("car-1");
//! let (mut engine, handle) = ConsensusEngine::new(
//!     id.clone(),
//!     EngineConfig::default(),
//!     Collaborators {
//!         store: Arc::new(LwwStore::new(id.clone())),
//!         peers: Arc::new(RandomPeerSelector::new(id, [NodeId::new("car-2")])),
//!         network: Arc::new(Discard),
//!     },
//! );
//!
//! handle.request_lead();
//! engine.iterate();
//! assert!(engine.state().is_leading());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod control;
mod engine;
mod error;
mod event;
mod queue;
mod runner;
mod selector;
mod state;
mod store;
mod traits;

pub use config::{EngineConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_IDLE_POLL};
pub use control::Control;
pub use engine::{Collaborators, ConsensusEngine, Step};
pub use error::{GossipError, Result};
pub use event::{AbortReason, EngineStats, GossipEvent};
pub use queue::{engine_inbox, EngineHandle, EngineInbox, Envelope};
pub use runner::EngineTask;
pub use selector::RandomPeerSelector;
pub use state::{NodeState, Role, Session};
pub use store::{LwwStore, Versioned};
pub use traits::{GossipStore, NetworkSender, PeerSelector, TransportObserver};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let _: NodeState = NodeState::default();
        let _: EngineStats = EngineStats::default();
        let _ = EngineConfig::default();
    }
}
