//! Common types used throughout `spindle`.
//!
//! This crate provides the identities and protocol messages exchanged by
//! Spindle nodes while they run pairwise anti-entropy gossip sessions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod id;
mod message;

pub use id::{NodeId, SessionId};
pub use message::{
    FollowResponse, GossipMessage, LeadGossipMessage, NoGossipResponse, Outcome, Payload,
    StatusAck,
};
