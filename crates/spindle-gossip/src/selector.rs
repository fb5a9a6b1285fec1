//! Random gossip partner selection.

use crate::traits::PeerSelector;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use spindle_types::NodeId;

/// Picks a uniformly random peer from a mutable list.
///
/// Returns the local identity when the list is empty.
#[derive(Debug)]
pub struct RandomPeerSelector {
    local: NodeId,
    peers: RwLock<Vec<NodeId>>,
}

impl RandomPeerSelector {
    /// Creates a selector for `local` with the given peers.
    ///
    /// The local identity and duplicates are filtered out.
    pub fn new(local: NodeId, peers: impl IntoIterator<Item = NodeId>) -> Self {
        let selector = Self {
            local,
            peers: RwLock::new(Vec::new()),
        };
        for peer in peers {
            selector.add_peer(peer);
        }
        selector
    }

    /// Adds a peer. Returns false if it was already known or is the local node.
    pub fn add_peer(&self, peer: NodeId) -> bool {
        if peer == self.local || peer.is_empty() {
            return false;
        }
        let mut peers = self.peers.write();
        if peers.contains(&peer) {
            return false;
        }
        peers.push(peer);
        true
    }

    /// Removes a peer. Returns false if it was not known.
    pub fn remove_peer(&self, peer: &NodeId) -> bool {
        let mut peers = self.peers.write();
        let before = peers.len();
        peers.retain(|p| p != peer);
        peers.len() != before
    }

    /// Returns the current peer list.
    pub fn peers(&self) -> Vec<NodeId> {
        self.peers.read().clone()
    }
}

impl PeerSelector for RandomPeerSelector {
    fn choose_target(&self) -> NodeId {
        self.peers
            .read()
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| self.local.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_empty_selector_returns_local() {
        let selector = RandomPeerSelector::new(NodeId::new("a"), []);
        assert_eq!(selector.choose_target(), NodeId::new("a"));
    }

    #[test]
    fn test_local_and_duplicates_filtered() {
        let selector = RandomPeerSelector::new(
            NodeId::new("a"),
            ["A", "b", "b", "c"].map(NodeId::new),
        );
        assert_eq!(selector.peers(), vec![NodeId::new("b"), NodeId::new("c")]);
    }

    #[test]
    fn test_choice_covers_all_peers() {
        let selector =
            RandomPeerSelector::new(NodeId::new("a"), ["b", "c", "d"].map(NodeId::new));

        let seen: HashSet<_> = (0..500).map(|_| selector.choose_target()).collect();
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&NodeId::new("a")));
    }

    #[test]
    fn test_remove_last_peer() {
        let selector = RandomPeerSelector::new(NodeId::new("a"), [NodeId::new("b")]);
        assert!(selector.remove_peer(&NodeId::new("b")));
        assert!(!selector.remove_peer(&NodeId::new("b")));
        assert_eq!(selector.choose_target(), NodeId::new("a"));
    }
}
