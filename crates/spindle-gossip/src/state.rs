//! Per-node session state.

use spindle_types::{NodeId, SessionId};
use std::fmt;

/// Role a node plays in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiated the session.
    Leader,
    /// Answered a lead message.
    Follower,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => f.write_str("leader"),
            Role::Follower => f.write_str("follower"),
        }
    }
}

/// The peer and session a non-idle node is engaged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    target: NodeId,
    session_id: SessionId,
}

impl Session {
    pub(crate) fn new(target: NodeId, session_id: SessionId) -> Self {
        Self { target, session_id }
    }

    /// Peer this session is with.
    pub fn target(&self) -> &NodeId {
        &self.target
    }

    /// Session identifier.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}

/// Gossip state of one node. Exactly one variant holds at any time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Not engaged in any session.
    #[default]
    Idle,
    /// Sent a lead message, waiting for its delivery status.
    LeadingWaitStatus(Session),
    /// Lead message delivered, waiting for the follower's response.
    LeadingWaitResponse(Session),
    /// Answered a lead message, waiting for the response's delivery status.
    Following(Session),
}

impl NodeState {
    /// Returns the state name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            NodeState::Idle => "idle",
            NodeState::LeadingWaitStatus(_) => "leading_wait_status",
            NodeState::LeadingWaitResponse(_) => "leading_wait_response",
            NodeState::Following(_) => "following",
        }
    }

    /// Returns true if no session is in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self, NodeState::Idle)
    }

    /// Returns true while this node leads a session.
    pub fn is_leading(&self) -> bool {
        matches!(
            self,
            NodeState::LeadingWaitStatus(_) | NodeState::LeadingWaitResponse(_)
        )
    }

    /// Returns true while this node follows a session.
    pub fn is_following(&self) -> bool {
        matches!(self, NodeState::Following(_))
    }

    /// Returns the current session, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            NodeState::Idle => None,
            NodeState::LeadingWaitStatus(s)
            | NodeState::LeadingWaitResponse(s)
            | NodeState::Following(s) => Some(s),
        }
    }

    /// Returns the peer of the current session, if any.
    pub fn target(&self) -> Option<&NodeId> {
        self.session().map(Session::target)
    }

    /// Session id expected on the status queue.
    pub fn waiting_status_id(&self) -> Option<SessionId> {
        self.session().map(Session::session_id)
    }

    /// Session this node initiated, while leading.
    pub fn leader_session_id(&self) -> Option<SessionId> {
        match self {
            NodeState::LeadingWaitStatus(s) | NodeState::LeadingWaitResponse(s) => {
                Some(s.session_id)
            }
            _ => None,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.session() {
            None => f.write_str(self.name()),
            Some(s) => write!(
                f,
                "{}(target={}, session={})",
                self.name(),
                s.target,
                s.session_id.short()
            ),
        }
    }
}
