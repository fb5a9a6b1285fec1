//! Inbound message and status queues.
//!
//! Each engine owns the receiving half of two unbounded channels. Transports
//! hold an [`EngineHandle`] and only ever append. Arrival order is whatever
//! order concurrent producers reach the channel, and every entry is consumed
//! at most once, by the engine.

use crate::control::Control;
use crate::error::{GossipError, Result};
use crate::traits::TransportObserver;
use spindle_types::{GossipMessage, NodeId, StatusAck};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// A queued inbound entry tagged with its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<T> {
    /// Peer the entry came from.
    pub sender: NodeId,
    /// The message or status.
    pub message: T,
    /// Position in this engine's arrival sequence.
    pub arrival: u64,
}

/// Consuming side of the queue pair, owned by the engine.
#[derive(Debug)]
pub(crate) struct QueuePair {
    messages: mpsc::UnboundedReceiver<Envelope<GossipMessage>>,
    statuses: mpsc::UnboundedReceiver<Envelope<StatusAck>>,
}

impl QueuePair {
    /// Removes the oldest message, if any.
    pub(crate) fn next_message(&mut self) -> Option<Envelope<GossipMessage>> {
        self.messages.try_recv().ok()
    }

    /// Removes the oldest status, if any.
    pub(crate) fn next_status(&mut self) -> Option<Envelope<StatusAck>> {
        self.statuses.try_recv().ok()
    }
}

/// Consuming side of a queue pair created ahead of its engine.
///
/// Lets a transport be built around the [`EngineHandle`] before the engine
/// that needs that transport as its sender exists. See
/// [`crate::ConsensusEngine::with_inbox`].
#[derive(Debug)]
pub struct EngineInbox {
    pub(crate) queues: QueuePair,
    pub(crate) control: Arc<Control>,
}

/// Creates an engine handle and the inbox a future engine will consume.
pub fn engine_inbox() -> (EngineHandle, EngineInbox) {
    let control = Arc::new(Control::new());
    let (handle, queues) = queue_pair(control.clone());
    (handle, EngineInbox { queues, control })
}

/// Producer handle for one engine.
///
/// Cheap to clone; hand one to every transport task.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    messages: mpsc::UnboundedSender<Envelope<GossipMessage>>,
    statuses: mpsc::UnboundedSender<Envelope<StatusAck>>,
    arrivals: Arc<AtomicU64>,
    control: Arc<Control>,
}

/// Creates a connected handle and queue pair.
pub(crate) fn queue_pair(control: Arc<Control>) -> (EngineHandle, QueuePair) {
    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = mpsc::unbounded_channel();

    let handle = EngineHandle {
        messages: message_tx,
        statuses: status_tx,
        arrivals: Arc::new(AtomicU64::new(0)),
        control,
    };
    let queues = QueuePair {
        messages: message_rx,
        statuses: status_rx,
    };
    (handle, queues)
}

impl EngineHandle {
    fn next_arrival(&self) -> u64 {
        self.arrivals.fetch_add(1, Ordering::SeqCst)
    }

    /// Appends a protocol message to the engine's message queue.
    ///
    /// Fails with [`GossipError::EngineClosed`] once the engine is dropped.
    pub fn try_message(&self, sender: NodeId, message: GossipMessage) -> Result<()> {
        let envelope = Envelope {
            sender,
            message,
            arrival: self.next_arrival(),
        };
        self.messages
            .send(envelope)
            .map_err(|_| GossipError::EngineClosed)?;
        self.control.wake();
        Ok(())
    }

    /// Appends a status acknowledgement to the engine's status queue.
    pub fn try_status(&self, sender: NodeId, status: StatusAck) -> Result<()> {
        let envelope = Envelope {
            sender,
            message: status,
            arrival: self.next_arrival(),
        };
        self.statuses
            .send(envelope)
            .map_err(|_| GossipError::EngineClosed)?;
        self.control.wake();
        Ok(())
    }

    /// Like [`EngineHandle::try_message`], dropping the message if the engine
    /// is gone.
    pub fn on_message(&self, sender: NodeId, message: GossipMessage) {
        if self.try_message(sender, message).is_err() {
            trace!("engine gone, dropping message");
        }
    }

    /// Like [`EngineHandle::try_status`], dropping the status if the engine
    /// is gone.
    pub fn on_status(&self, sender: NodeId, status: StatusAck) {
        if self.try_status(sender, status).is_err() {
            trace!("engine gone, dropping status");
        }
    }

    /// Returns true once the engine has been dropped.
    pub fn is_closed(&self) -> bool {
        self.messages.is_closed()
    }

    /// Asks the engine to lead at its next idle iteration.
    pub fn request_lead(&self) {
        self.control.request_lead();
    }

    /// Clears the lead request.
    pub fn cancel_lead(&self) {
        self.control.cancel_lead();
    }

    /// Returns true while a lead request is raised.
    pub fn wants_lead(&self) -> bool {
        self.control.wants_lead()
    }

    /// Asks the engine's run loop to stop.
    pub fn request_stop(&self) {
        self.control.request_stop();
    }

    /// Returns the shared control block.
    pub fn control(&self) -> Arc<Control> {
        self.control.clone()
    }
}

impl TransportObserver for EngineHandle {
    fn on_message(&self, sender: NodeId, message: GossipMessage) -> Result<()> {
        self.try_message(sender, message)
    }

    fn on_status(&self, sender: NodeId, status: StatusAck) -> Result<()> {
        self.try_status(sender, status)
    }
}
