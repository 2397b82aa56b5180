//! Simulated message transport.
//!
//! Messages are reliable and delivered exactly once, but each one is delayed
//! by an independently sampled latency, so two messages sent back to back
//! may arrive in either order. In-flight messages are kept in deadline order,
//! which turns the transport into the engine's event queue.

use crate::clock::Timestamp;
use crate::config::DeliveryOrder;
use crate::message::{Message, MessageId, MessageKind};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ricart_env::NodeId;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

/// Source of per-message network delay.
pub trait LatencyModel: Send {
    /// Samples the delay for one message on the `from → to` link.
    fn sample(&mut self, from: NodeId, to: NodeId, kind: MessageKind) -> Duration;
}

/// Uniformly distributed delay in whole milliseconds.
pub struct UniformLatency {
    min_ms: u64,
    max_ms: u64,
    rng: ChaCha8Rng,
}

impl UniformLatency {
    /// Bounds are inclusive; they are swapped if given in the wrong order.
    pub fn new(min_ms: u64, max_ms: u64, seed: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl LatencyModel for UniformLatency {
    fn sample(&mut self, _from: NodeId, _to: NodeId, _kind: MessageKind) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.min_ms..=self.max_ms))
    }
}

/// Fixed delay for every message.
#[derive(Debug, Clone, Copy)]
pub struct ConstantLatency(pub Duration);

impl LatencyModel for ConstantLatency {
    fn sample(&mut self, _from: NodeId, _to: NodeId, _kind: MessageKind) -> Duration {
        self.0
    }
}

type QueueKey = (Duration, MessageId);

/// In-flight message store and delivery scheduler.
pub struct Transport {
    /// Undelivered messages keyed by (deadline, id)
    in_flight: BTreeMap<QueueKey, Message>,

    /// Deadline lookup for explicit delivery by id
    deadlines: HashMap<MessageId, Duration>,

    /// Recently delivered messages, oldest first
    history: VecDeque<Message>,
    history_limit: usize,

    next_id: u64,
    latency: Box<dyn LatencyModel>,
    order: DeliveryOrder,

    /// Tie-break RNG for `DeliveryOrder::Shuffled`
    rng: ChaCha8Rng,
}

impl Transport {
    pub fn new(
        latency: Box<dyn LatencyModel>,
        order: DeliveryOrder,
        history_limit: usize,
        seed: u64,
    ) -> Self {
        Self {
            in_flight: BTreeMap::new(),
            deadlines: HashMap::new(),
            history: VecDeque::new(),
            history_limit,
            next_id: 0,
            latency,
            order,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Replaces the latency model. Messages already in flight keep their deadlines.
    pub fn set_latency_model(&mut self, latency: Box<dyn LatencyModel>) {
        self.latency = latency;
    }

    pub fn set_delivery_order(&mut self, order: DeliveryOrder) {
        self.order = order;
    }

    /// Queues a message. Never blocks; the message arrives after
    /// `extra_delay` plus a sampled network delay.
    pub fn send(
        &mut self,
        from: NodeId,
        to: NodeId,
        kind: MessageKind,
        timestamp: Timestamp,
        now: Duration,
        extra_delay: Duration,
    ) -> MessageId {
        debug_assert_ne!(from, to, "nodes never message themselves");

        let id = MessageId(self.next_id);
        self.next_id += 1;

        let deliver_at = now + extra_delay + self.latency.sample(from, to, kind);
        let message = Message {
            id,
            from,
            to,
            kind,
            timestamp,
            sent_at: now,
            deliver_at,
            delivered: false,
        };

        self.deadlines.insert(id, deliver_at);
        self.in_flight.insert((deliver_at, id), message);
        id
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.in_flight.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pops the next message due at or before `now`, marking it delivered.
    ///
    /// Among messages sharing the earliest deadline the pick follows the
    /// configured [`DeliveryOrder`].
    pub fn next_due(&mut self, now: Duration) -> Option<Message> {
        let deadline = self.next_deadline()?;
        if deadline > now {
            return None;
        }

        let key = match self.order {
            DeliveryOrder::Fifo => *self.in_flight.keys().next()?,
            DeliveryOrder::Shuffled => {
                let ties: Vec<QueueKey> = self
                    .in_flight
                    .range((deadline, MessageId(0))..=(deadline, MessageId(u64::MAX)))
                    .map(|(key, _)| *key)
                    .collect();
                *ties.choose(&mut self.rng)?
            }
        };

        self.complete(key)
    }

    /// Delivers a specific message now, ignoring its deadline.
    ///
    /// Returns `None` for unknown or already delivered ids, which makes
    /// redelivery a no-op.
    pub fn take(&mut self, id: MessageId) -> Option<Message> {
        let deadline = *self.deadlines.get(&id)?;
        self.complete((deadline, id))
    }

    fn complete(&mut self, key: QueueKey) -> Option<Message> {
        let mut message = self.in_flight.remove(&key)?;
        self.deadlines.remove(&message.id);
        message.delivered = true;

        if self.history_limit > 0 {
            if self.history.len() == self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(message.clone());
        }

        Some(message)
    }

    /// Undelivered messages in deadline order.
    pub fn in_flight(&self) -> impl Iterator<Item = &Message> {
        self.in_flight.values()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Delivered messages, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Message> {
        self.history.iter()
    }

    /// Drops all in-flight and historical messages.
    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.deadlines.clear();
        self.history.clear();
    }
}
