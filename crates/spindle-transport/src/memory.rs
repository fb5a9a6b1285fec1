//! In-process network for tests and simulations.
//!
//! Delivery is immediate. Acknowledged messages produce a status on the
//! sender's observer right after delivery: good if the target is registered
//! and reachable, bad otherwise.

use parking_lot::RwLock;
use spindle_gossip::{NetworkSender, TransportObserver};
use spindle_types::{GossipMessage, NodeId, StatusAck};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct Registry {
    nodes: HashMap<NodeId, Arc<dyn TransportObserver>>,
    cut: HashSet<(NodeId, NodeId)>,
}

impl Registry {
    fn is_cut(&self, a: &NodeId, b: &NodeId) -> bool {
        self.cut.contains(&link(a, b))
    }
}

fn link(a: &NodeId, b: &NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Shared in-memory network.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    registry: Arc<RwLock<Registry>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a node's observer.
    pub fn register(&self, id: NodeId, observer: Arc<dyn TransportObserver>) {
        debug!(node = %id, "node joined memory network");
        self.registry.write().nodes.insert(id, observer);
    }

    /// Detaches a node. Later sends to it report a bad status.
    pub fn unregister(&self, id: &NodeId) -> bool {
        self.registry.write().nodes.remove(id).is_some()
    }

    /// Returns a sender that sends as `local`.
    pub fn sender(&self, local: NodeId) -> MemorySender {
        MemorySender {
            local,
            network: self.clone(),
        }
    }

    /// Cuts the link between two nodes in both directions.
    pub fn partition(&self, a: &NodeId, b: &NodeId) {
        debug!(a = %a, b = %b, "partitioning link");
        self.registry.write().cut.insert(link(a, b));
    }

    /// Restores the link between two nodes.
    pub fn heal(&self, a: &NodeId, b: &NodeId) {
        debug!(a = %a, b = %b, "healing link");
        self.registry.write().cut.remove(&link(a, b));
    }

    /// Restores every cut link.
    pub fn heal_all(&self) {
        self.registry.write().cut.clear();
    }

    /// Returns the registered node ids.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.registry.read().nodes.keys().cloned().collect()
    }

    fn deliver(&self, from: &NodeId, to: &NodeId, message: GossipMessage) {
        let (target, origin) = {
            let registry = self.registry.read();
            let target = if registry.is_cut(from, to) {
                None
            } else {
                registry.nodes.get(to).cloned()
            };
            (target, registry.nodes.get(from).cloned())
        };

        let ack = message.expects_ack().then(|| message.session_id());
        let delivered = match target {
            Some(target) => {
                trace!(from = %from, to = %to, kind = message.kind(), "delivering");
                match target.on_message(from.clone(), message) {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(from = %from, to = %to, error = %e, "target refused delivery");
                        false
                    }
                }
            }
            None => {
                debug!(from = %from, to = %to, kind = message.kind(), "target unreachable");
                false
            }
        };

        if let (Some(session_id), Some(origin)) = (ack, origin) {
            let status = if delivered {
                StatusAck::good(session_id)
            } else {
                StatusAck::bad(session_id)
            };
            if origin.on_status(to.clone(), status).is_err() {
                trace!(node = %from, "sender engine gone, status dropped");
            }
        }
    }
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("MemoryNetwork")
            .field("nodes", &registry.nodes.len())
            .field("cut_links", &registry.cut.len())
            .finish()
    }
}

/// [`NetworkSender`] bound to one node of a [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemorySender {
    local: NodeId,
    network: MemoryNetwork,
}

impl NetworkSender for MemorySender {
    fn send(&self, target: &NodeId, message: GossipMessage) {
        self.network.deliver(&self.local, target, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use spindle_gossip::{engine_inbox, Result as GossipResult};
    use spindle_types::{LeadGossipMessage, NoGossipResponse, Payload, SessionId};

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<(NodeId, GossipMessage)>>,
        statuses: Mutex<Vec<(NodeId, StatusAck)>>,
    }

    impl TransportObserver for Recorder {
        fn on_message(&self, sender: NodeId, message: GossipMessage) -> GossipResult<()> {
            self.messages.lock().push((sender, message));
            Ok(())
        }

        fn on_status(&self, sender: NodeId, status: StatusAck) -> GossipResult<()> {
            self.statuses.lock().push((sender, status));
            Ok(())
        }
    }

    fn pair() -> (MemoryNetwork, Arc<Recorder>, Arc<Recorder>) {
        let network = MemoryNetwork::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        network.register(NodeId::new("a"), a.clone());
        network.register(NodeId::new("b"), b.clone());
        (network, a, b)
    }

    fn lead() -> GossipMessage {
        LeadGossipMessage::new(Payload::default()).into()
    }

    #[test]
    fn test_delivery_acknowledges_sender() {
        let (network, a, b) = pair();
        let message = lead();
        let sid = message.session_id();

        network.sender(NodeId::new("a")).send(&NodeId::new("b"), message.clone());

        assert_eq!(*b.messages.lock(), vec![(NodeId::new("a"), message)]);
        assert_eq!(
            *a.statuses.lock(),
            vec![(NodeId::new("b"), StatusAck::good(sid))]
        );
    }

    #[test]
    fn test_partition_and_heal() {
        let (network, a, b) = pair();
        let sender = network.sender(NodeId::new("a"));
        network.partition(&NodeId::new("b"), &NodeId::new("a"));

        let message = lead();
        let sid = message.session_id();
        sender.send(&NodeId::new("b"), message);
        assert!(b.messages.lock().is_empty());
        assert_eq!(
            *a.statuses.lock(),
            vec![(NodeId::new("b"), StatusAck::bad(sid))]
        );

        network.heal(&NodeId::new("a"), &NodeId::new("b"));
        sender.send(&NodeId::new("b"), lead());
        assert_eq!(b.messages.lock().len(), 1);
    }

    #[test]
    fn test_unknown_target_reports_bad() {
        let (network, a, _) = pair();
        network
            .sender(NodeId::new("a"))
            .send(&NodeId::new("zz"), lead());

        assert_eq!(a.statuses.lock().len(), 1);
        assert_eq!(a.statuses.lock()[0].1.outcome, spindle_types::Outcome::Bad);
    }

    #[test]
    fn test_rejection_not_acknowledged() {
        let (network, a, b) = pair();
        network.sender(NodeId::new("a")).send(
            &NodeId::new("b"),
            NoGossipResponse {
                session_id: SessionId::new(),
            }
            .into(),
        );

        assert_eq!(b.messages.lock().len(), 1);
        assert!(a.statuses.lock().is_empty());
    }

    #[test]
    fn test_unregistered_node_is_unreachable() {
        let (network, a, b) = pair();
        let mut nodes = network.nodes();
        nodes.sort();
        assert_eq!(nodes, vec![NodeId::new("a"), NodeId::new("b")]);

        assert!(network.unregister(&NodeId::new("b")));
        assert!(!network.unregister(&NodeId::new("b")));
        assert_eq!(network.nodes(), vec![NodeId::new("a")]);

        network.sender(NodeId::new("a")).send(&NodeId::new("b"), lead());
        assert!(b.messages.lock().is_empty());
        assert_eq!(a.statuses.lock()[0].1.outcome, spindle_types::Outcome::Bad);
    }

    #[test]
    fn test_heal_all_restores_every_link() {
        let (network, a, b) = pair();
        let c = Arc::new(Recorder::default());
        network.register(NodeId::new("c"), c.clone());
        network.partition(&NodeId::new("a"), &NodeId::new("b"));
        network.partition(&NodeId::new("a"), &NodeId::new("c"));

        network.heal_all();
        let sender = network.sender(NodeId::new("a"));
        sender.send(&NodeId::new("b"), lead());
        sender.send(&NodeId::new("c"), lead());

        assert_eq!(b.messages.lock().len(), 1);
        assert_eq!(c.messages.lock().len(), 1);
        assert!(a
            .statuses
            .lock()
            .iter()
            .all(|(_, s)| s.outcome == spindle_types::Outcome::Good));
    }

    #[test]
    fn test_closed_engine_reports_bad() {
        let (network, a, _) = pair();
        let (handle, inbox) = engine_inbox();
        drop(inbox);
        network.register(NodeId::new("b"), Arc::new(handle));

        let message = lead();
        let sid = message.session_id();
        network.sender(NodeId::new("a")).send(&NodeId::new("b"), message);

        assert_eq!(
            *a.statuses.lock(),
            vec![(NodeId::new("b"), StatusAck::bad(sid))]
        );
    }
}
