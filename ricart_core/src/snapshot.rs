//! Read-only views of engine state for renderers and observers.

use crate::clock::Timestamp;
use crate::message::Message;
use crate::node::{Node, NodeState};
use ricart_env::NodeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Running counters kept by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub requests_sent: u64,
    pub replies_sent: u64,
    pub delivered: u64,

    /// REPLYs withheld by the decision rule
    pub deferred: u64,

    /// REPLYs that arrived for a peer no longer pending
    pub stale_replies: u64,

    /// Commands rejected as no-ops
    pub ignored_commands: u64,

    /// Critical-section entries, indexed by node id
    pub entries: Vec<u64>,
}

impl EngineStats {
    pub(crate) fn for_nodes(node_count: usize) -> Self {
        Self {
            entries: vec![0; node_count],
            ..Self::default()
        }
    }

    pub fn messages_sent(&self) -> u64 {
        self.requests_sent + self.replies_sent
    }

    pub fn total_entries(&self) -> u64 {
        self.entries.iter().sum()
    }
}

/// Point-in-time copy of everything an external view needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulated time
    pub now: Duration,

    /// Largest Lamport value any node has reached since the last reset
    pub global_clock: Timestamp,

    pub nodes: Vec<Node>,

    /// Undelivered messages in deadline order
    pub in_flight: Vec<Message>,

    /// Recently delivered messages, oldest first
    pub history: Vec<Message>,

    pub stats: EngineStats,
}

impl Snapshot {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Nodes currently inside the critical section.
    pub fn holders(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.state() == NodeState::Held)
            .map(|n| n.id())
            .collect()
    }

    pub fn count_in(&self, state: NodeState) -> usize {
        self.nodes.iter().filter(|n| n.state() == state).count()
    }

    /// True when every node is RELEASED and nothing is in flight.
    pub fn is_quiescent(&self) -> bool {
        self.in_flight.is_empty() && self.count_in(NodeState::Released) == self.nodes.len()
    }
}
