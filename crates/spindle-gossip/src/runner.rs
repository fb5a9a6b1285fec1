//! Async driver for the engine.
//!
//! The engine itself is synchronous. [`ConsensusEngine::run`] steps it until
//! a stop is requested, blocking on a wake-up instead of spinning whenever
//! there is nothing to do.

use crate::control::Control;
use crate::engine::{ConsensusEngine, Step};
use crate::error::{GossipError, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

impl ConsensusEngine {
    /// Runs the engine until a stop is requested, then returns it.
    ///
    /// Stop is observed between iterations only; a session in progress is
    /// left in whatever state it reached.
    pub async fn run(mut self) -> Self {
        info!(node = %self.id(), "gossip engine started");

        loop {
            if self.control.stop_requested() {
                break;
            }

            match self.iterate() {
                Step::Advanced => tokio::task::yield_now().await,
                Step::Idle => {
                    // Lead retries with no eligible peer fall through to the
                    // poll interval.
                    tokio::select! {
                        _ = self.control.woken() => {}
                        _ = tokio::time::sleep(self.config.idle_poll) => {}
                    }
                }
            }
        }

        info!(
            node = %self.id(),
            state = %self.state(),
            "gossip engine stopped"
        );
        self
    }

    /// Spawns [`ConsensusEngine::run`] on the current runtime.
    pub fn spawn(self) -> EngineTask {
        let control = self.control();
        debug!(node = %self.id(), "spawning gossip engine");
        EngineTask {
            control,
            handle: tokio::spawn(self.run()),
        }
    }
}

/// Supervisor handle for a running engine.
#[derive(Debug)]
pub struct EngineTask {
    control: Arc<Control>,
    handle: JoinHandle<ConsensusEngine>,
}

impl EngineTask {
    /// Returns the running engine's control block.
    pub fn control(&self) -> Arc<Control> {
        self.control.clone()
    }

    /// Returns true once the run loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Requests a stop and waits for the run loop to exit.
    pub async fn stop(self) -> Result<ConsensusEngine> {
        self.control.request_stop();
        self.handle
            .await
            .map_err(|e| GossipError::TaskFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::Collaborators;
    use crate::traits::{GossipStore, NetworkSender, PeerSelector};
    use crate::EngineConfig;
    use parking_lot::Mutex;
    use spindle_types::{GossipMessage, LeadGossipMessage, NodeId, Payload, StatusAck};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Counts session terminations.
    #[derive(Default)]
    struct CountingStore {
        commits: AtomicUsize,
        aborts: AtomicUsize,
    }

    impl GossipStore for CountingStore {
        fn lead_payload(&self) -> Payload {
            Payload::default()
        }
        fn follow_payload(&self) -> Payload {
            Payload::default()
        }
        fn merge(&self, _sender: &NodeId, _payload: &Payload) {}
        fn commit(&self) {
            self.commits.fetch_add(1, Ordering::SeqCst);
        }
        fn abort(&self) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Target(NodeId);

    impl PeerSelector for Target {
        fn choose_target(&self) -> NodeId {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(NodeId, GossipMessage)>>);

    impl NetworkSender for Outbox {
        fn send(&self, target: &NodeId, message: GossipMessage) {
            self.0.lock().push((target.clone(), message));
        }
    }

    fn engine(target: &str) -> (super::ConsensusEngine, crate::EngineHandle, Arc<Outbox>) {
        let (engine, handle, outbox, _) = engine_with_store(target);
        (engine, handle, outbox)
    }

    fn engine_with_store(
        target: &str,
    ) -> (
        super::ConsensusEngine,
        crate::EngineHandle,
        Arc<Outbox>,
        Arc<CountingStore>,
    ) {
        let outbox = Arc::new(Outbox::default());
        let store = Arc::new(CountingStore::default());
        let (engine, handle) = super::ConsensusEngine::new(
            NodeId::new("a"),
            EngineConfig::default().with_idle_poll(Duration::from_millis(5)),
            Collaborators {
                store: store.clone(),
                peers: Arc::new(Target(NodeId::new(target))),
                network: outbox.clone(),
            },
        );
        (engine, handle, outbox, store)
    }

    #[tokio::test]
    async fn test_stop_before_start_returns_idle_engine() {
        let (engine, handle, _) = engine("b");
        handle.request_stop();

        let engine = engine.run().await;
        assert!(engine.state().is_idle());
    }

    #[tokio::test]
    async fn test_run_processes_queued_input() {
        let (engine, handle, outbox) = engine("b");
        let task = engine.spawn();

        let lead = LeadGossipMessage::new(Payload::default());
        let sid = lead.session_id;
        handle.on_message(NodeId::new("c"), lead.into());

        tokio::time::timeout(Duration::from_secs(5), async {
            while outbox.0.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("follow response sent");

        handle.on_status(NodeId::new("c"), StatusAck::good(sid));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let engine = task.stop().await.unwrap();
        assert!(engine.state().is_idle());
        assert_eq!(engine.stats().commits, 1);
    }

    #[tokio::test]
    async fn test_stop_while_waiting_for_peer() {
        // No eligible peer: the loop keeps retrying at the poll interval.
        let (engine, handle, outbox) = engine("a");
        handle.request_lead();
        let task = engine.spawn();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!task.is_finished());

        let engine = task.stop().await.unwrap();
        assert!(engine.state().is_idle());
        assert!(engine.stats().self_target_skips >= 1);
        assert!(outbox.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stop_leaves_open_session_and_queue_untouched() {
        let (engine, handle, outbox, store) = engine_with_store("b");
        let task = engine.spawn();

        let first = LeadGossipMessage::new(Payload::default());
        let s1 = first.session_id;
        handle.on_message(NodeId::new("c"), first.into());

        tokio::time::timeout(Duration::from_secs(5), async {
            while outbox.0.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("follow response sent");

        // Stays queued while following.
        let second = LeadGossipMessage::new(Payload::default());
        let s2 = second.session_id;
        handle.on_message(NodeId::new("d"), second.into());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut engine = task.stop().await.unwrap();
        assert!(engine.state().is_following());
        assert_eq!(engine.state().target(), Some(&NodeId::new("c")));
        assert_eq!(engine.state().waiting_status_id(), Some(s1));
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
        assert_eq!(store.aborts.load(Ordering::SeqCst), 0);
        assert_eq!(outbox.0.lock().len(), 1);

        // The queued lead is still there once the session completes.
        handle.on_status(NodeId::new("c"), StatusAck::good(s1));
        engine.iterate();
        engine.iterate();
        assert_eq!(store.commits.load(Ordering::SeqCst), 1);
        assert_eq!(engine.state().target(), Some(&NodeId::new("d")));
        assert_eq!(engine.state().waiting_status_id(), Some(s2));
    }
}
