//! Per-node state machine.
//!
//! ```text
//!            request_cs                 last REPLY
//! RELEASED ─────────────► WANTED ─────────────────► HELD
//!    ▲                                                │
//!    └────────────── release (timer / manual) ────────┘
//! ```
//!
//! The node only knows about its own bookkeeping. Sending messages and
//! deciding when to call each transition is the engine's job.

use crate::clock::{LamportClock, Timestamp};
use crate::message::Ticket;
use ricart_env::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Critical-section state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Released,
    Wanted,
    Held,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeState::Released => "RELEASED",
            NodeState::Wanted => "WANTED",
            NodeState::Held => "HELD",
        };
        f.write_str(name)
    }
}

/// A participant in the mutual-exclusion protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    state: NodeState,

    /// Timestamp of the current request; `None` while RELEASED
    request_timestamp: Option<Timestamp>,

    clock: LamportClock,

    /// Peers whose REPLY is still outstanding
    pending_replies: BTreeSet<NodeId>,

    /// Peers owed a REPLY once we leave the critical section
    deferred_replies: Vec<NodeId>,

    /// Remaining ticks of occupancy; non-zero only while HELD
    critical_section_timer: u32,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            state: NodeState::Released,
            request_timestamp: None,
            clock: LamportClock::new(),
            pending_replies: BTreeSet::new(),
            deferred_replies: Vec::new(),
            critical_section_timer: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn request_timestamp(&self) -> Option<Timestamp> {
        self.request_timestamp
    }

    pub fn clock(&self) -> Timestamp {
        self.clock.value()
    }

    pub fn pending_replies(&self) -> &BTreeSet<NodeId> {
        &self.pending_replies
    }

    pub fn deferred_replies(&self) -> &[NodeId] {
        &self.deferred_replies
    }

    pub fn critical_section_timer(&self) -> u32 {
        self.critical_section_timer
    }

    /// The ordering ticket of the outstanding request, if any.
    pub fn ticket(&self) -> Option<Ticket> {
        self.request_timestamp.map(|ts| Ticket::new(ts, self.id))
    }

    /// RELEASED → WANTED.
    ///
    /// Returns the new request timestamp, or `None` if the node was not
    /// RELEASED (in which case nothing changes).
    pub(crate) fn begin_request(&mut self, peers: &[NodeId]) -> Option<Timestamp> {
        if self.state != NodeState::Released {
            return None;
        }

        let timestamp = self.clock.tick(0);
        self.request_timestamp = Some(timestamp);
        self.pending_replies.clear();
        self.pending_replies
            .extend(peers.iter().copied().filter(|peer| *peer != self.id));
        self.state = NodeState::Wanted;

        Some(timestamp)
    }

    /// Absorbs the timestamp of an incoming message.
    pub(crate) fn observe(&mut self, received: Timestamp) -> Timestamp {
        self.clock.tick(received)
    }

    /// Decision rule for an incoming REQUEST carrying `ticket`.
    ///
    /// A RELEASED node always replies. A WANTED node replies only if the
    /// requester's ticket is strictly older than its own. A HELD node never
    /// replies.
    pub fn should_reply_immediately(&self, ticket: Ticket) -> bool {
        match self.state {
            NodeState::Released => true,
            NodeState::Wanted => self.ticket().map_or(true, |own| ticket < own),
            NodeState::Held => false,
        }
    }

    /// Queues a REPLY to `peer` until release.
    pub(crate) fn defer(&mut self, peer: NodeId) {
        if peer != self.id && !self.deferred_replies.contains(&peer) {
            self.deferred_replies.push(peer);
        }
    }

    /// Records a REPLY from `peer`. Returns false if it was not pending.
    pub(crate) fn record_reply(&mut self, peer: NodeId) -> bool {
        self.pending_replies.remove(&peer)
    }

    /// True once a WANTED node has collected every reply.
    pub fn ready_to_enter(&self) -> bool {
        self.state == NodeState::Wanted && self.pending_replies.is_empty()
    }

    /// WANTED → HELD.
    pub(crate) fn enter_critical_section(&mut self, ticks: u32) {
        debug_assert!(self.ready_to_enter());
        self.state = NodeState::Held;
        self.critical_section_timer = ticks.max(1);
    }

    /// Counts down one tick of occupancy. Returns true when the timer expires.
    pub(crate) fn countdown(&mut self) -> bool {
        if self.state != NodeState::Held {
            return false;
        }
        self.critical_section_timer = self.critical_section_timer.saturating_sub(1);
        self.critical_section_timer == 0
    }

    /// HELD → RELEASED.
    ///
    /// Returns the peers owed a REPLY together with the timestamp those
    /// replies carry. Flushed replies are stamped like immediate ones: with
    /// the current clock, without a send tick.
    pub(crate) fn release(&mut self) -> Option<(Vec<NodeId>, Timestamp)> {
        if self.state != NodeState::Held {
            return None;
        }

        self.state = NodeState::Released;
        self.request_timestamp = None;
        self.critical_section_timer = 0;

        let deferred = std::mem::take(&mut self.deferred_replies);
        Some((deferred, self.clock.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers(n: u32) -> Vec<NodeId> {
        (0..n).map(NodeId).collect()
    }

    #[test]
    fn test_begin_request_fills_pending_with_peers() {
        let mut node = Node::new(NodeId(1));
        let ts = node.begin_request(&peers(4)).unwrap();

        assert_eq!(ts, 1);
        assert_eq!(node.state(), NodeState::Wanted);
        assert_eq!(node.request_timestamp(), Some(1));
        let pending: Vec<_> = node.pending_replies().iter().copied().collect();
        assert_eq!(pending, vec![NodeId(0), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn test_begin_request_rejected_unless_released() {
        let mut node = Node::new(NodeId(0));
        node.begin_request(&peers(3));
        let before = node.clone();

        assert!(node.begin_request(&peers(3)).is_none());
        assert_eq!(node, before);
    }

    #[test]
    fn test_released_node_always_replies() {
        let node = Node::new(NodeId(0));
        assert!(node.should_reply_immediately(Ticket::new(100, NodeId(5))));
    }

    #[test]
    fn test_wanted_node_replies_only_to_older_tickets() {
        let mut node = Node::new(NodeId(1));
        node.observe(4);
        let ts = node.begin_request(&peers(3)).unwrap();
        assert_eq!(ts, 6);

        assert!(node.should_reply_immediately(Ticket::new(5, NodeId(2))));
        assert!(node.should_reply_immediately(Ticket::new(6, NodeId(0))));
        assert!(!node.should_reply_immediately(Ticket::new(6, NodeId(2))));
        assert!(!node.should_reply_immediately(Ticket::new(7, NodeId(0))));
    }

    #[test]
    fn test_held_node_never_replies() {
        let mut node = Node::new(NodeId(2));
        node.begin_request(&peers(2 + 1));
        node.record_reply(NodeId(0));
        node.record_reply(NodeId(1));
        node.enter_critical_section(3);

        assert!(!node.should_reply_immediately(Ticket::new(0, NodeId(0))));
    }

    #[test]
    fn test_record_reply_is_idempotent() {
        let mut node = Node::new(NodeId(0));
        node.begin_request(&peers(3));

        assert!(node.record_reply(NodeId(1)));
        assert!(!node.record_reply(NodeId(1)));
        assert!(!node.ready_to_enter());
        assert!(node.record_reply(NodeId(2)));
        assert!(node.ready_to_enter());
    }

    #[test]
    fn test_countdown_then_release_flushes_deferred() {
        let mut node = Node::new(NodeId(0));
        node.begin_request(&peers(3));
        node.record_reply(NodeId(1));
        node.record_reply(NodeId(2));
        node.enter_critical_section(2);
        node.defer(NodeId(2));
        node.defer(NodeId(1));
        node.defer(NodeId(1));

        assert!(!node.countdown());
        assert!(node.countdown());

        let clock_before = node.clock();
        let (flushed, ts) = node.release().unwrap();
        assert_eq!(flushed, vec![NodeId(2), NodeId(1)]);
        assert_eq!(ts, clock_before);
        assert_eq!(node.clock(), clock_before);
        assert_eq!(node.state(), NodeState::Released);
        assert!(node.deferred_replies().is_empty());
        assert_eq!(node.request_timestamp(), None);
        assert_eq!(node.critical_section_timer(), 0);
    }

    #[test]
    fn test_node_never_defers_itself() {
        let mut node = Node::new(NodeId(3));
        node.defer(NodeId(3));
        assert!(node.deferred_replies().is_empty());
    }

    #[test]
    fn test_release_requires_held() {
        let mut node = Node::new(NodeId(0));
        assert!(node.release().is_none());
        node.begin_request(&peers(2));
        assert!(node.release().is_none());
        assert_eq!(node.state(), NodeState::Wanted);
    }
}
