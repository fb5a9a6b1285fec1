//! Gossip session state machine.
//!
//! One [`ConsensusEngine`] runs per node. Each call to
//! [`ConsensusEngine::iterate`] consumes at most one queued entry, consults
//! the collaborators, and moves the node between the states of
//! [`NodeState`]:
//!
//! ```text
//!            lead flag, target chosen                 status GOOD
//!   ┌──────┐ ───────────────────────▶ ┌────────────┐ ───────────▶ ┌──────────────┐
//!   │ Idle │                          │ WaitStatus │              │ WaitResponse │
//!   └──────┘ ◀─────────────────────── └────────────┘              └──────────────┘
//!     │  ▲          status BAD (abort)                                   │
//!     │  │                                                               │
//!     │  └──────────── follow (merge, commit) / no-gossip (abort) ◀──────┘
//!     │
//!     │ lead received (merge, answer)   ┌───────────┐
//!     └────────────────────────────────▶│ Following │── status GOOD/BAD ──▶ Idle
//!                                       └───────────┘   (commit/abort)
//! ```
//!
//! Entries are correlated by session id. Anything that does not match the
//! awaited session is discarded and never re-queued.

use crate::config::EngineConfig;
use crate::control::Control;
use crate::event::{AbortReason, EngineStats, GossipEvent};
use crate::queue::{engine_inbox, EngineHandle, EngineInbox, Envelope, QueuePair};
use crate::state::{NodeState, Role, Session};
use crate::traits::{GossipStore, NetworkSender, PeerSelector};
use spindle_types::{
    FollowResponse, GossipMessage, LeadGossipMessage, NoGossipResponse, NodeId, Outcome,
    SessionId, StatusAck,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Result of one [`ConsensusEngine::iterate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An entry was consumed or a lead was sent.
    Advanced,
    /// Nothing to do in the current state.
    Idle,
}

/// The collaborators an engine drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Application payload owner.
    pub store: Arc<dyn GossipStore>,
    /// Target choice for lead attempts.
    pub peers: Arc<dyn PeerSelector>,
    /// Outbound delivery.
    pub network: Arc<dyn NetworkSender>,
}

/// Per-node gossip session engine.
pub struct ConsensusEngine {
    /// This node's identity.
    id: NodeId,

    /// Engine configuration.
    pub(crate) config: EngineConfig,

    /// Current session state.
    state: NodeState,

    /// Inbound queues, consumed only here.
    queues: QueuePair,

    /// Lead and stop flags.
    pub(crate) control: Arc<Control>,

    store: Arc<dyn GossipStore>,
    peers: Arc<dyn PeerSelector>,
    network: Arc<dyn NetworkSender>,

    /// Event broadcaster.
    events: broadcast::Sender<GossipEvent>,

    /// Running totals.
    stats: EngineStats,
}

impl ConsensusEngine {
    /// Creates an idle engine and the handle transports use to feed it.
    pub fn new(
        id: NodeId,
        config: EngineConfig,
        collaborators: Collaborators,
    ) -> (Self, EngineHandle) {
        let (handle, inbox) = engine_inbox();
        (Self::with_inbox(id, config, collaborators, inbox), handle)
    }

    /// Creates an idle engine consuming a previously created inbox.
    pub fn with_inbox(
        id: NodeId,
        config: EngineConfig,
        collaborators: Collaborators,
        inbox: EngineInbox,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            id,
            config,
            state: NodeState::Idle,
            queues: inbox.queues,
            control: inbox.control,
            store: collaborators.store,
            peers: collaborators.peers,
            network: collaborators.network,
            events,
            stats: EngineStats::default(),
        }
    }

    /// Returns this node's identity.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Returns a copy of the running totals.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Returns the shared control block.
    pub fn control(&self) -> Arc<Control> {
        self.control.clone()
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<GossipEvent> {
        self.events.subscribe()
    }

    /// Performs one state transition step.
    pub fn iterate(&mut self) -> Step {
        match &self.state {
            NodeState::Idle => self.process_idle(),
            NodeState::Following(session) => {
                let session = session.clone();
                self.process_following(session)
            }
            NodeState::LeadingWaitStatus(session) => {
                let session = session.clone();
                self.process_leading_wait_status(session)
            }
            NodeState::LeadingWaitResponse(session) => {
                let session = session.clone();
                self.process_leading_wait_response(session)
            }
        }
    }

    fn process_idle(&mut self) -> Step {
        if let Some(entry) = self.queues.next_message() {
            self.handle_idle_message(entry);
            return Step::Advanced;
        }

        if self.control.wants_lead() {
            return self.start_lead();
        }

        Step::Idle
    }

    fn handle_idle_message(&mut self, entry: Envelope<GossipMessage>) {
        let Envelope {
            sender, message, ..
        } = entry;
        let kind = message.kind();

        match message {
            GossipMessage::Lead(lead) => {
                if sender == self.id {
                    warn!(session = %lead.session_id, "ignoring lead message from self");
                    self.discard(&sender, kind);
                    return;
                }

                self.store.merge(&sender, &lead.payload);
                let response = FollowResponse {
                    session_id: lead.session_id,
                    payload: self.store.follow_payload(),
                };
                self.network.send(&sender, response.into());
                self.stats.follows += 1;

                debug!(
                    peer = %sender,
                    session = %lead.session_id,
                    "idle: answered lead, following"
                );
                self.emit(GossipEvent::SessionStarted {
                    role: Role::Follower,
                    peer: sender.clone(),
                    session: lead.session_id,
                });
                self.state = NodeState::Following(Session::new(sender, lead.session_id));
            }
            GossipMessage::Follow(_) | GossipMessage::NoGossip(_) => {
                debug!(peer = %sender, kind, "idle: discarding message");
                self.discard(&sender, kind);
            }
        }
    }

    fn start_lead(&mut self) -> Step {
        let target = self.peers.choose_target();
        if target == self.id || target.is_empty() {
            trace!("no eligible peer, retrying later");
            self.stats.self_target_skips += 1;
            return Step::Idle;
        }

        let lead = LeadGossipMessage::new(self.store.lead_payload());
        let session_id = lead.session_id;
        self.network.send(&target, lead.into());
        self.stats.leads_sent += 1;

        debug!(peer = %target, session = %session_id, "idle: sent lead, waiting for status");
        self.emit(GossipEvent::SessionStarted {
            role: Role::Leader,
            peer: target.clone(),
            session: session_id,
        });
        self.state = NodeState::LeadingWaitStatus(Session::new(target, session_id));
        Step::Advanced
    }

    fn process_following(&mut self, session: Session) -> Step {
        let Some(entry) = self.queues.next_status() else {
            return Step::Idle;
        };

        if !self.status_matches(&entry, &session) {
            return Step::Advanced;
        }

        match entry.message.outcome {
            Outcome::Good => {
                self.store.commit();
                info!(peer = %session.target(), session = %session.session_id(), "following: good status, committed");
                self.finish_committed(Role::Follower, session);
            }
            Outcome::Bad => {
                self.store.abort();
                info!(peer = %session.target(), session = %session.session_id(), "following: bad status, aborted");
                self.finish_aborted(Role::Follower, session, AbortReason::BadStatus);
            }
        }
        Step::Advanced
    }

    fn process_leading_wait_status(&mut self, session: Session) -> Step {
        let Some(entry) = self.queues.next_status() else {
            return Step::Idle;
        };

        if !self.status_matches(&entry, &session) {
            return Step::Advanced;
        }

        match entry.message.outcome {
            Outcome::Good => {
                debug!(
                    peer = %session.target(),
                    session = %session.session_id(),
                    "leading: good status, waiting for response"
                );
                self.state = NodeState::LeadingWaitResponse(session);
            }
            Outcome::Bad => {
                self.store.abort();
                info!(peer = %session.target(), session = %session.session_id(), "leading: bad status, aborted");
                self.finish_aborted(Role::Leader, session, AbortReason::BadStatus);
            }
        }
        Step::Advanced
    }

    fn process_leading_wait_response(&mut self, session: Session) -> Step {
        let Some(Envelope {
            sender, message, ..
        }) = self.queues.next_message()
        else {
            return Step::Idle;
        };
        let kind = message.kind();

        if sender == self.id {
            warn!(kind, "ignoring message from self");
            self.discard(&sender, kind);
            return Step::Advanced;
        }

        if &sender != session.target() {
            // Only one partner at a time.
            match message {
                GossipMessage::Lead(lead) => {
                    debug!(
                        peer = %sender,
                        target = %session.target(),
                        "leading: rejecting lead from non-target"
                    );
                    self.reject(&sender, lead.session_id);
                }
                GossipMessage::Follow(_) | GossipMessage::NoGossip(_) => {
                    debug!(peer = %sender, kind, "leading: discarding message from non-target");
                    self.discard(&sender, kind);
                }
            }
            return Step::Advanced;
        }

        match message {
            GossipMessage::Follow(follow) => {
                if follow.session_id != session.session_id() {
                    warn!(
                        peer = %sender,
                        leading = %session.session_id(),
                        received = %follow.session_id,
                        "leading: stale follow response"
                    );
                    self.discard(&sender, kind);
                    return Step::Advanced;
                }

                self.store.merge(&sender, &follow.payload);
                self.store.commit();
                info!(peer = %sender, session = %follow.session_id, "leading: received follow, committed");
                self.finish_committed(Role::Leader, session);
            }
            GossipMessage::Lead(lead) => {
                // Both sides tried to lead each other; each rejects the other.
                debug!(
                    peer = %sender,
                    session = %lead.session_id,
                    "leading: target is also leading, rejecting"
                );
                self.reject(&sender, lead.session_id);
            }
            GossipMessage::NoGossip(no_gossip) => {
                if no_gossip.session_id != session.session_id() {
                    warn!(
                        peer = %sender,
                        leading = %session.session_id(),
                        received = %no_gossip.session_id,
                        "leading: stale rejection"
                    );
                    self.discard(&sender, kind);
                    return Step::Advanced;
                }

                self.store.abort();
                info!(peer = %sender, session = %no_gossip.session_id, "leading: rejected by target, aborted");
                self.finish_aborted(Role::Leader, session, AbortReason::Rejected);
            }
        }
        Step::Advanced
    }

    fn status_matches(&mut self, entry: &Envelope<StatusAck>, session: &Session) -> bool {
        if entry.message.session_id == session.session_id() {
            return true;
        }
        debug!(
            state = self.state.name(),
            peer = %entry.sender,
            waiting = %session.session_id(),
            received = %entry.message.session_id,
            "discarding status"
        );
        self.discard(&entry.sender, "status");
        false
    }

    fn reject(&mut self, peer: &NodeId, session: SessionId) {
        self.network
            .send(peer, NoGossipResponse { session_id: session }.into());
        self.stats.rejections_sent += 1;
        self.emit(GossipEvent::LeadRejected {
            peer: peer.clone(),
            session,
        });
    }

    fn discard(&mut self, peer: &NodeId, kind: &'static str) {
        self.stats.discarded += 1;
        self.emit(GossipEvent::Discarded {
            peer: peer.clone(),
            kind,
        });
    }

    fn finish_committed(&mut self, role: Role, session: Session) {
        self.stats.commits += 1;
        self.emit(GossipEvent::SessionCommitted {
            role,
            peer: session.target().clone(),
            session: session.session_id(),
        });
        self.state = NodeState::Idle;
    }

    fn finish_aborted(&mut self, role: Role, session: Session, reason: AbortReason) {
        self.stats.aborts += 1;
        self.emit(GossipEvent::SessionAborted {
            role,
            peer: session.target().clone(),
            session: session.session_id(),
            reason,
        });
        self.state = NodeState::Idle;
    }

    fn emit(&self, event: GossipEvent) {
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusEngine")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("wants_lead", &self.control.wants_lead())
            .field("stats", &self.stats)
            .finish()
    }
}
