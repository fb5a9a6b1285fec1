//! External control signals for the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Sticky control flags shared between the engine and its callers.
///
/// The engine only reads the lead flag. Once set it stays set until a caller
/// clears it with [`Control::cancel_lead`], so a node that finishes a session
/// with the flag still raised immediately tries to lead again.
#[derive(Debug, Default)]
pub struct Control {
    lead: AtomicBool,
    stop: AtomicBool,
    wake: Notify,
}

impl Control {
    /// Creates a control block with both flags cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the engine to initiate a session the next time it is idle.
    pub fn request_lead(&self) {
        self.lead.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Clears the lead request.
    pub fn cancel_lead(&self) {
        self.lead.store(false, Ordering::SeqCst);
    }

    /// Returns true while a lead request is raised.
    pub fn wants_lead(&self) -> bool {
        self.lead.load(Ordering::SeqCst)
    }

    /// Asks the run loop to exit at its next iteration boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Returns true once a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Wakes the run loop if it is waiting for input.
    pub(crate) fn wake(&self) {
        self.wake.notify_one();
    }

    /// Resolves when the run loop is woken.
    pub(crate) async fn woken(&self) {
        self.wake.notified().await;
    }
}
