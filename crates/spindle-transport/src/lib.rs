//! Spindle Transport
//!
//! Moves gossip messages between nodes and feeds inbound traffic to an
//! engine's [`TransportObserver`](spindle_gossip::TransportObserver).
//!
//! - [`TcpTransport`]: length-prefixed JSON frames over TCP, one outbound
//!   connection per peer, status frames flowing back on the same socket
//! - [`MemoryNetwork`]: immediate in-process delivery with link partitioning,
//!   for tests and simulations
//!
//! Both implement [`NetworkSender`](spindle_gossip::NetworkSender) and both
//! acknowledge only lead and follow messages.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod memory;
mod tcp;

pub use error::{Result, TransportError};
pub use frame::{codec, Frame, MAX_FRAME_LENGTH};
pub use memory::{MemoryNetwork, MemorySender};
pub use tcp::TcpTransport;
