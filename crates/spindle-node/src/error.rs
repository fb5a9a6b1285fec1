//! Node error types.

use spindle_gossip::GossipError;
use spindle_transport::TransportError;
use thiserror::Error;

/// Errors that can occur while configuring or running a node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but is not usable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Gossip engine failure.
    #[error("gossip error: {0}")]
    Gossip(#[from] GossipError),
}

/// A specialized Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
