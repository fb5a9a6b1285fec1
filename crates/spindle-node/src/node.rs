//! A running gossip node: TCP transport, store, selector and engine wired
//! together.

use crate::config::NodeConfig;
use crate::error::Result;
use spindle_gossip::{
    engine_inbox, Collaborators, ConsensusEngine, EngineHandle, EngineStats, EngineTask,
    GossipEvent, LwwStore, RandomPeerSelector,
};
use spindle_transport::TcpTransport;
use spindle_types::NodeId;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// A gossip node running on the current tokio runtime.
pub struct GossipNode {
    id: NodeId,
    store: Arc<LwwStore>,
    selector: Arc<RandomPeerSelector>,
    transport: Arc<TcpTransport>,
    handle: EngineHandle,
    events: broadcast::Receiver<GossipEvent>,
    task: EngineTask,
}

impl GossipNode {
    /// Validates `config`, binds the transport and starts the engine.
    pub async fn start(config: &NodeConfig) -> Result<Self> {
        config.validate()?;
        let id = config.local_id();

        let (handle, inbox) = engine_inbox();
        let transport = Arc::new(
            TcpTransport::bind(id.clone(), config.listen_addr, Arc::new(handle.clone())).await?,
        );

        let store = Arc::new(LwwStore::new(id.clone()));
        let selector = Arc::new(RandomPeerSelector::new(id.clone(), []));
        for (peer, addr) in config.peer_addrs() {
            transport.add_peer(peer.clone(), addr);
            selector.add_peer(peer);
        }

        let engine = ConsensusEngine::with_inbox(
            id.clone(),
            config.engine_config(),
            Collaborators {
                store: store.clone(),
                peers: selector.clone(),
                network: transport.clone(),
            },
            inbox,
        );
        let events = engine.subscribe();

        if config.lead {
            handle.request_lead();
        }
        let task = engine.spawn();

        info!(
            node = %id,
            addr = %transport.local_addr(),
            peers = selector.peers().len(),
            lead = config.lead,
            "gossip node started"
        );

        Ok(Self {
            id,
            store,
            selector,
            transport,
            handle,
            events,
            task,
        })
    }

    /// Returns this node's identity.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Returns the address the transport listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Returns the node's store.
    pub fn store(&self) -> &Arc<LwwStore> {
        &self.store
    }

    /// Returns the engine handle.
    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<GossipEvent> {
        self.events.resubscribe()
    }

    /// Registers a peer with both the transport and the selector.
    pub fn add_peer(&self, peer: NodeId, addr: SocketAddr) {
        self.transport.add_peer(peer.clone(), addr);
        self.selector.add_peer(peer);
    }

    /// Returns the known peers.
    pub fn peers(&self) -> Vec<NodeId> {
        self.selector.peers()
    }

    /// Asks the engine to keep initiating sessions.
    pub fn request_lead(&self) {
        self.handle.request_lead();
    }

    /// Stops initiating sessions.
    pub fn cancel_lead(&self) {
        self.handle.cancel_lead();
    }

    /// Stops the engine and the transport, returning the final counters.
    pub async fn shutdown(self) -> Result<EngineStats> {
        let engine = self.task.stop().await?;
        self.transport.shutdown();

        let stats = engine.stats();
        info!(
            node = %self.id,
            commits = stats.commits,
            aborts = stats.aborts,
            keys = self.store.len(),
            "gossip node stopped"
        );
        Ok(stats)
    }
}

impl std::fmt::Debug for GossipNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipNode")
            .field("id", &self.id)
            .field("addr", &self.transport.local_addr())
            .field("peers", &self.selector.peers())
            .field("keys", &self.store.len())
            .finish()
    }
}
