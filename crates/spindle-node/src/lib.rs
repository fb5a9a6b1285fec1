//! # Spindle Node
//!
//! Runs one vehicle's gossip participant: a [`GossipNode`] owns a TCP
//! transport, a last-writer-wins store and a gossip engine, and keeps them
//! wired together until shut down.
//!
//! ```text
//!  ┌─────────────────────────────────────────────┐
//!  │                 GossipNode                  │
//!  │                                             │
//!  │  TcpTransport ──on_message/on_status──┐     │
//!  │       ▲                               ▼     │
//!  │       │ send                   EngineHandle │
//!  │       │                               │     │
//!  │  ConsensusEngine ◀────── queues ──────┘     │
//!  │       │                                     │
//!  │       ├── LwwStore (merge/commit/abort)     │
//!  │       └── RandomPeerSelector                │
//!  └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod error;
mod node;
pub mod observability;

pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::GossipNode;
