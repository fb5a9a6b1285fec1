//! Gossip error types.

use thiserror::Error;

/// Errors that can occur around the gossip engine.
///
/// The state machine itself never fails; these cover configuration and
/// the task that drives it.
#[derive(Debug, Error)]
pub enum GossipError {
    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine has been dropped and no longer accepts input.
    #[error("engine closed")]
    EngineClosed,

    /// The engine task panicked or was cancelled.
    #[error("engine task failed: {0}")]
    TaskFailed(String),
}

/// A specialized Result type for gossip operations.
pub type Result<T> = std::result::Result<T, GossipError>;
