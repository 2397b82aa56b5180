//! Protocol events and command outcomes reported by the engine.

use crate::message::Ticket;
use crate::node::NodeState;
use ricart_env::NodeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Notable state transitions, recorded in the order they happen.
///
/// Observers (the invariant oracle, exporters) drain these after each step
/// so that a transition is never missed between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// RELEASED → WANTED
    Requested { node: NodeId, ticket: Ticket, at: Duration },

    /// `node` withheld its REPLY to `requester`
    Deferred { node: NodeId, requester: NodeId, at: Duration },

    /// WANTED → HELD, with the tickets of every other node still WANTED
    Entered {
        node: NodeId,
        ticket: Ticket,
        at: Duration,
        waiting: Vec<Ticket>,
    },

    /// HELD → RELEASED, with the peers whose deferred REPLY was flushed
    Released {
        node: NodeId,
        flushed: Vec<NodeId>,
        at: Duration,
    },

    /// The node set was rebuilt
    Reset { node_count: usize },
}

/// Result of an external command. Rejections are values, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Accepted,
    Ignored(IgnoreReason),
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted)
    }
}

/// Why a command was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnoreReason {
    UnknownNode(NodeId),
    /// `request_cs` on a node that is WANTED or HELD
    NotReleased(NodeState),
    /// `release_cs` on a node that is not HELD
    NotHeld(NodeState),
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::UnknownNode(id) => write!(f, "unknown node {}", id),
            IgnoreReason::NotReleased(state) => write!(f, "node is {}, not RELEASED", state),
            IgnoreReason::NotHeld(state) => write!(f, "node is {}, not HELD", state),
        }
    }
}
