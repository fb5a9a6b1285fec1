//! Property tests for the gossip session state machine.
//!
//! Random interleavings of lead requests, inbound messages, status acks and
//! iterations are fed to a single engine. After every step the engine must
//! still satisfy the session life-cycle rules:
//! - every started session ends in exactly one commit or abort
//! - at most one session is open at a time
//! - nothing is ever sent to the local node
//! - follow responses only answer leads, rejections only leave a leading node

use parking_lot::Mutex;
use proptest::prelude::*;
use spindle_gossip::{
    Collaborators, ConsensusEngine, EngineConfig, EngineHandle, GossipStore, NetworkSender,
    NodeState, PeerSelector,
};
use spindle_types::{
    FollowResponse, GossipMessage, LeadGossipMessage, NoGossipResponse, NodeId, Payload,
    SessionId, StatusAck,
};
use std::sync::Arc;

const LOCAL: &str = "n0";
const PEERS: [&str; 4] = ["n0", "n1", "n2", "n3"];

#[derive(Default)]
struct CountingStore {
    merges: Mutex<Vec<NodeId>>,
    commits: Mutex<u64>,
    aborts: Mutex<u64>,
}

impl GossipStore for CountingStore {
    fn lead_payload(&self) -> Payload {
        Payload::default()
    }

    fn follow_payload(&self) -> Payload {
        Payload::default()
    }

    fn merge(&self, sender: &NodeId, _payload: &Payload) {
        self.merges.lock().push(sender.clone());
    }

    fn commit(&self) {
        *self.commits.lock() += 1;
    }

    fn abort(&self) {
        *self.aborts.lock() += 1;
    }
}

/// Cycles through every known node, including the local one.
#[derive(Default)]
struct RoundRobin(Mutex<usize>);

impl PeerSelector for RoundRobin {
    fn choose_target(&self) -> NodeId {
        let mut next = self.0.lock();
        *next += 1;
        NodeId::new(PEERS[*next % PEERS.len()])
    }
}

#[derive(Default)]
struct Outbox(Mutex<Vec<(NodeId, GossipMessage)>>);

impl NetworkSender for Outbox {
    fn send(&self, target: &NodeId, message: GossipMessage) {
        self.0.lock().push((target.clone(), message));
    }
}

#[derive(Debug, Clone)]
enum Op {
    SetLead(bool),
    Message {
        sender: usize,
        kind: u8,
        current_session: bool,
    },
    Status {
        good: bool,
        current_session: bool,
    },
    Iterate,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => any::<bool>().prop_map(Op::SetLead),
        3 => (0..PEERS.len(), 0u8..3, any::<bool>()).prop_map(|(sender, kind, current_session)| {
            Op::Message {
                sender,
                kind,
                current_session,
            }
        }),
        3 => (any::<bool>(), any::<bool>())
            .prop_map(|(good, current_session)| Op::Status { good, current_session }),
        5 => Just(Op::Iterate),
    ]
}

struct World {
    engine: ConsensusEngine,
    handle: EngineHandle,
    store: Arc<CountingStore>,
    outbox: Arc<Outbox>,
}

fn world() -> World {
    let store = Arc::new(CountingStore::default());
    let outbox = Arc::new(Outbox::default());
    let (engine, handle) = ConsensusEngine::new(
        NodeId::new(LOCAL),
        EngineConfig::default(),
        Collaborators {
            store: store.clone(),
            peers: Arc::new(RoundRobin::default()),
            network: outbox.clone(),
        },
    );
    World {
        engine,
        handle,
        store,
        outbox,
    }
}

fn session_for(state: &NodeState, current: bool) -> SessionId {
    match state.waiting_status_id() {
        Some(sid) if current => sid,
        _ => SessionId::new(),
    }
}

fn message(kind: u8, session_id: SessionId) -> GossipMessage {
    match kind {
        0 => LeadGossipMessage {
            session_id,
            payload: Payload::default(),
        }
        .into(),
        1 => FollowResponse {
            session_id,
            payload: Payload::default(),
        }
        .into(),
        _ => NoGossipResponse { session_id }.into(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_session_life_cycle(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let mut w = world();
        let local = NodeId::new(LOCAL);
        let mut leads_received: Vec<(NodeId, SessionId)> = Vec::new();

        for op in ops {
            match op {
                Op::SetLead(true) => w.handle.request_lead(),
                Op::SetLead(false) => w.handle.cancel_lead(),
                Op::Message { sender, kind, current_session } => {
                    let sid = session_for(w.engine.state(), current_session);
                    let sender = NodeId::new(PEERS[sender]);
                    if kind == 0 {
                        leads_received.push((sender.clone(), sid));
                    }
                    w.handle.on_message(sender, message(kind, sid));
                }
                Op::Status { good, current_session } => {
                    let sid = session_for(w.engine.state(), current_session);
                    let ack = if good { StatusAck::good(sid) } else { StatusAck::bad(sid) };
                    w.handle.on_status(NodeId::new("n1"), ack);
                }
                Op::Iterate => {
                    let before = w.engine.state().clone();
                    let merges_before = w.store.merges.lock().len();
                    w.engine.iterate();
                    let after = w.engine.state().clone();

                    // Merges only come from the session partner.
                    let merges = w.store.merges.lock().clone();
                    for sender in &merges[merges_before..] {
                        prop_assert_eq!(after.target().or(before.target()), Some(sender));
                    }

                    // A session never switches partner without passing through idle.
                    if let (Some(b), Some(a)) = (before.session(), after.session()) {
                        prop_assert_eq!(b, a);
                    }
                }
            }

            let stats = w.engine.stats();
            let commits = *w.store.commits.lock();
            let aborts = *w.store.aborts.lock();
            prop_assert_eq!(commits, stats.commits);
            prop_assert_eq!(aborts, stats.aborts);

            let started = stats.leads_sent + stats.follows;
            let ended = commits + aborts;
            let open = u64::from(!w.engine.state().is_idle());
            prop_assert_eq!(started, ended + open);
        }

        for (target, message) in w.outbox.0.lock().iter() {
            prop_assert_ne!(target, &local);
            match message {
                GossipMessage::Follow(f) => {
                    prop_assert!(leads_received.contains(&(target.clone(), f.session_id)));
                }
                GossipMessage::NoGossip(n) => {
                    prop_assert!(leads_received.contains(&(target.clone(), n.session_id)));
                }
                GossipMessage::Lead(_) => {}
            }
        }
    }

    #[test]
    fn prop_stale_entries_never_change_state(
        stale in prop::collection::vec((any::<bool>(), 0u8..3), 1..50)
    ) {
        let mut w = world();
        // RoundRobin picks n1 first.
        w.handle.request_lead();
        w.engine.iterate();
        let sid = w.engine.state().leader_session_id().unwrap();
        w.handle.on_status(NodeId::new("n1"), StatusAck::good(sid));
        w.engine.iterate();
        let waiting = w.engine.state().clone();
        prop_assert!(matches!(waiting, NodeState::LeadingWaitResponse(_)));

        for (is_status, kind) in stale {
            if is_status {
                w.handle.on_status(NodeId::new("n1"), StatusAck::bad(SessionId::new()));
            } else {
                // Stale follow or rejection from the target, or a follow from a stranger.
                let (sender, kind) = match kind {
                    0 => ("n1", 1),
                    1 => ("n1", 2),
                    _ => ("n2", 1),
                };
                w.handle.on_message(NodeId::new(sender), message(kind, SessionId::new()));
            }
        }

        for _ in 0..60 {
            w.engine.iterate();
            prop_assert_eq!(w.engine.state(), &waiting);
        }
        prop_assert_eq!(*w.store.commits.lock(), 0);
        prop_assert_eq!(*w.store.aborts.lock(), 0);
    }
}
