//! The mutual-exclusion engine.
//!
//! Owns the node arena and the transport, and applies the Ricart–Agrawala
//! decision rule whenever a message arrives:
//!
//! ```text
//! on REQUEST(T, S) at R:
//!     R.clock := max(R.clock, T) + 1
//!     if R is RELEASED, or R is WANTED and (T, S) < (R.ts, R.id):
//!         send REPLY to S
//!     else:
//!         defer S
//!
//! on REPLY from S at R:
//!     R.clock := max(R.clock, T) + 1
//!     pending(R) -= {S}
//!     if R is WANTED and pending(R) is empty: enter HELD
//! ```
//!
//! Every public operation is an atomic unit of work: it runs to completion
//! before the next one starts, so a node never observes a half-applied
//! transition.

use crate::clock::Timestamp;
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::event::{CommandOutcome, EngineEvent, IgnoreReason};
use crate::message::{Message, MessageId, MessageKind, Ticket};
use crate::node::{Node, NodeState};
use crate::snapshot::{EngineStats, Snapshot};
use crate::transport::{LatencyModel, Transport, UniformLatency};
use ricart_env::NodeId;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default critical-section occupancy in driver ticks.
pub const DEFAULT_OCCUPANCY_TICKS: u32 = 3;

/// Runs the protocol for a set of nodes.
///
/// Events accumulate until [`drain_events`](Self::drain_events) is called.
/// Hosts should drain after every step; past `event_limit` the oldest
/// events are dropped.
pub struct MutexEngine {
    config: EngineConfig,

    /// Timer value assigned on entry to HELD
    occupancy_ticks: u32,

    /// Node arena, indexed by `NodeId`
    nodes: Vec<Node>,

    transport: Transport,

    /// Current simulated time
    now: Duration,

    /// Highest Lamport value reached since the last reset
    global_clock: Timestamp,

    stats: EngineStats,
    events: VecDeque<EngineEvent>,
}

impl MutexEngine {
    /// Creates an engine with no nodes; call [`initialize`](Self::initialize)
    /// before issuing commands.
    pub fn new(config: EngineConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;

        let latency = UniformLatency::new(config.latency_min_ms, config.latency_max_ms, seed);
        let transport = Transport::new(
            Box::new(latency),
            config.delivery_order,
            config.history_limit,
            seed.wrapping_mul(0x517cc1b727220a95),
        );

        Ok(Self {
            config,
            occupancy_ticks: DEFAULT_OCCUPANCY_TICKS,
            nodes: Vec::new(),
            transport,
            now: Duration::ZERO,
            global_clock: 0,
            stats: EngineStats::default(),
            events: VecDeque::new(),
        })
    }

    /// Swaps in a different latency model.
    pub fn with_latency_model(mut self, latency: Box<dyn LatencyModel>) -> Self {
        self.transport.set_latency_model(latency);
        self
    }

    pub fn set_latency_model(&mut self, latency: Box<dyn LatencyModel>) {
        self.transport.set_latency_model(latency);
    }

    pub fn set_occupancy_ticks(&mut self, ticks: u32) {
        self.occupancy_ticks = ticks.max(1);
    }

    /// (Re)creates `node_count` RELEASED nodes and drops every message.
    ///
    /// An out-of-range count is rejected before anything changes.
    pub fn initialize(&mut self, node_count: usize) -> Result<(), ConfigError> {
        self.config.check_node_count(node_count)?;

        self.nodes = (0..node_count).map(|i| Node::new(NodeId::from_index(i))).collect();
        self.transport.clear();
        self.now = Duration::ZERO;
        self.global_clock = 0;
        self.stats = EngineStats::for_nodes(node_count);
        self.events.clear();
        self.record(EngineEvent::Reset { node_count });

        info!(node_count, "initialized node set");
        Ok(())
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn global_clock(&self) -> Timestamp {
        self.global_clock
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Ids of in-flight messages in deadline order.
    pub fn in_flight_ids(&self) -> Vec<MessageId> {
        self.transport.in_flight().map(|m| m.id).collect()
    }

    /// Nodes currently RELEASED.
    pub fn idle_nodes(&self) -> Vec<NodeId> {
        self.nodes_in(NodeState::Released)
    }

    /// Nodes currently HELD. Never more than one.
    pub fn holders(&self) -> Vec<NodeId> {
        self.nodes_in(NodeState::Held)
    }

    fn nodes_in(&self, state: NodeState) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.state() == state)
            .map(|n| n.id())
            .collect()
    }

    /// True when every node is RELEASED and nothing is in flight.
    pub fn is_quiescent(&self) -> bool {
        self.transport.in_flight_count() == 0
            && self.nodes.iter().all(|n| n.state() == NodeState::Released)
    }

    /// Takes the events recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    /// Number of events waiting to be drained.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Read-only copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            now: self.now,
            global_clock: self.global_clock,
            nodes: self.nodes.clone(),
            in_flight: self.transport.in_flight().cloned().collect(),
            history: self.transport.history().cloned().collect(),
            stats: self.stats.clone(),
        }
    }

    // ── commands ─────────────────────────────────────────────────────────

    /// RELEASED → WANTED: timestamps a request and broadcasts it.
    pub fn request_cs(&mut self, id: NodeId) -> CommandOutcome {
        let peers: Vec<NodeId> = self
            .nodes
            .iter()
            .map(|n| n.id())
            .filter(|peer| *peer != id)
            .collect();

        let Some(node) = self.nodes.get_mut(id.index()) else {
            return self.ignore(IgnoreReason::UnknownNode(id));
        };
        let Some(timestamp) = node.begin_request(&peers) else {
            let state = node.state();
            return self.ignore(IgnoreReason::NotReleased(state));
        };

        self.note_clock(timestamp);
        let ticket = Ticket::new(timestamp, id);
        debug!(node = %id, %ticket, "requesting critical section");
        self.record(EngineEvent::Requested { node: id, ticket, at: self.now });

        for peer in &peers {
            self.transport
                .send(id, *peer, MessageKind::Request, timestamp, self.now, Duration::ZERO);
            self.stats.requests_sent += 1;
        }

        // Only reachable with a single node, which the node-count bounds exclude.
        if self.nodes[id.index()].ready_to_enter() {
            self.enter_critical_section(id);
        }

        CommandOutcome::Accepted
    }

    /// HELD → RELEASED: flushes every deferred REPLY.
    pub fn release_cs(&mut self, id: NodeId) -> CommandOutcome {
        let Some(node) = self.nodes.get_mut(id.index()) else {
            return self.ignore(IgnoreReason::UnknownNode(id));
        };
        let Some((flushed, timestamp)) = node.release() else {
            let state = node.state();
            return self.ignore(IgnoreReason::NotHeld(state));
        };

        self.note_clock(timestamp);
        for peer in &flushed {
            self.transport
                .send(id, *peer, MessageKind::Reply, timestamp, self.now, Duration::ZERO);
            self.stats.replies_sent += 1;
        }

        info!(node = %id, flushed = flushed.len(), "left critical section");
        self.record(EngineEvent::Released { node: id, flushed, at: self.now });
        CommandOutcome::Accepted
    }

    /// Counts down every HELD node's timer and releases those that expire.
    pub fn countdown_critical_sections(&mut self) -> Vec<NodeId> {
        let expired: Vec<NodeId> = self
            .nodes
            .iter_mut()
            .filter_map(|n| n.countdown().then(|| n.id()))
            .collect();

        for id in &expired {
            self.release_cs(*id);
        }
        expired
    }

    // ── delivery ─────────────────────────────────────────────────────────

    /// Delivers every message due by `now`, in deadline order.
    ///
    /// Time advances to each message's deadline as it is handled, so a REPLY
    /// triggered while draining that is itself due by `now` is delivered in
    /// the same call. Returns the number of messages delivered.
    pub fn deliver_due(&mut self, now: Duration) -> usize {
        let mut delivered = 0;
        while let Some(message) = self.transport.next_due(now) {
            self.now = self.now.max(message.deliver_at);
            self.dispatch(message);
            delivered += 1;
        }
        self.now = self.now.max(now);
        delivered
    }

    /// Delivers one specific in-flight message immediately.
    ///
    /// Returns false if the id is unknown or was already delivered; in that
    /// case nothing changes.
    pub fn deliver(&mut self, id: MessageId) -> bool {
        match self.transport.take(id) {
            Some(message) => {
                self.dispatch(message);
                true
            }
            None => {
                debug!(message = %id, "ignoring redelivery");
                false
            }
        }
    }

    fn dispatch(&mut self, message: Message) {
        if message.to.index() >= self.nodes.len() || message.from.index() >= self.nodes.len() {
            warn!(
                message = %message.id,
                from = %message.from,
                to = %message.to,
                "dropping message for unknown node"
            );
            return;
        }

        self.stats.delivered += 1;
        match message.kind {
            MessageKind::Request => self.on_request(&message),
            MessageKind::Reply => self.on_reply(&message),
        }
    }

    /// Decision rule for an arriving REQUEST.
    pub(crate) fn on_request(&mut self, message: &Message) {
        let receiver = &mut self.nodes[message.to.index()];
        let clock = receiver.observe(message.timestamp);
        let ticket = Ticket::new(message.timestamp, message.from);
        let reply_now = receiver.should_reply_immediately(ticket);

        if reply_now {
            debug!(node = %message.to, requester = %message.from, %ticket, "replying");
        } else {
            receiver.defer(message.from);
            debug!(node = %message.to, requester = %message.from, %ticket, "deferring reply");
        }

        self.note_clock(clock);

        if reply_now {
            let delay = self.config.reply_delay();
            self.transport
                .send(message.to, message.from, MessageKind::Reply, clock, self.now, delay);
            self.stats.replies_sent += 1;
        } else {
            self.stats.deferred += 1;
            self.record(EngineEvent::Deferred {
                node: message.to,
                requester: message.from,
                at: self.now,
            });
        }
    }

    /// Bookkeeping for an arriving REPLY.
    pub(crate) fn on_reply(&mut self, message: &Message) {
        let receiver = &mut self.nodes[message.to.index()];
        let clock = receiver.observe(message.timestamp);
        let was_pending = receiver.record_reply(message.from);
        let ready = receiver.ready_to_enter();

        self.note_clock(clock);

        if !was_pending {
            self.stats.stale_replies += 1;
            debug!(node = %message.to, from = %message.from, "reply was not pending");
            return;
        }

        if ready {
            self.enter_critical_section(message.to);
        }
    }

    fn enter_critical_section(&mut self, id: NodeId) {
        let waiting: Vec<Ticket> = self
            .nodes
            .iter()
            .filter(|n| n.id() != id && n.state() == NodeState::Wanted)
            .filter_map(|n| n.ticket())
            .collect();

        let node = &mut self.nodes[id.index()];
        node.enter_critical_section(self.occupancy_ticks);
        let Some(ticket) = node.ticket() else {
            return;
        };

        if let Some(entry) = self.stats.entries.get_mut(id.index()) {
            *entry += 1;
        }

        info!(node = %id, %ticket, "entered critical section");
        self.record(EngineEvent::Entered {
            node: id,
            ticket,
            at: self.now,
            waiting,
        });
    }

    fn ignore(&mut self, reason: IgnoreReason) -> CommandOutcome {
        self.stats.ignored_commands += 1;
        warn!(%reason, "command ignored");
        CommandOutcome::Ignored(reason)
    }

    fn note_clock(&mut self, value: Timestamp) {
        self.global_clock = self.global_clock.max(value);
    }

    fn record(&mut self, event: EngineEvent) {
        let limit = self.config.event_limit;
        if limit == 0 {
            return;
        }
        if self.events.len() == limit {
            self.events.pop_front();
            warn!(limit, "event log full, dropping oldest event");
        }
        self.events.push_back(event);
    }
}
