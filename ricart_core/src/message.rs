//! Protocol messages exchanged between nodes.

use crate::clock::Timestamp;
use ricart_env::NodeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique, monotonically assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two message types of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Request,
    Reply,
}

/// A REQUEST or REPLY travelling between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: MessageKind,

    /// Sender's Lamport clock at send time
    pub timestamp: Timestamp,

    /// Simulated time the message was handed to the transport
    pub sent_at: Duration,

    /// Simulated arrival time
    pub deliver_at: Duration,

    /// Set once, when the message is handed to its receiver
    pub delivered: bool,
}

/// Ordering ticket of a critical-section request.
///
/// Field order matters: the derived `Ord` compares the Lamport timestamp
/// first and falls back to the node id, giving the total order the decision
/// rule relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub timestamp: Timestamp,
    pub node: NodeId,
}

impl Ticket {
    pub fn new(timestamp: Timestamp, node: NodeId) -> Self {
        Self { timestamp, node }
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.timestamp, self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_orders_by_timestamp_first() {
        assert!(Ticket::new(1, NodeId(5)) < Ticket::new(2, NodeId(0)));
    }

    #[test]
    fn test_ticket_breaks_ties_by_node_id() {
        assert!(Ticket::new(3, NodeId(0)) < Ticket::new(3, NodeId(1)));
        assert!(!(Ticket::new(3, NodeId(1)) < Ticket::new(3, NodeId(1))));
    }

    #[test]
    fn test_message_kind_serializes_upper_case() {
        let json = serde_json::to_string(&MessageKind::Request).unwrap();
        assert_eq!(json, "\"REQUEST\"");
    }
}
