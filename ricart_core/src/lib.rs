//! Ricart–Agrawala Core - Distributed Mutual Exclusion Without an Arbiter
//!
//! Nodes coordinate exclusive access to a critical section purely through
//! timestamped REQUEST/REPLY messages:
//! 1. **Ordering**: scalar Lamport clocks give every request a ticket
//!    `(timestamp, node id)`, totally ordered across the system
//! 2. **Decision rule**: a node answers a request at once unless it holds the
//!    critical section or is waiting with an older ticket; otherwise it
//!    defers the reply until it leaves
//! 3. **Transport**: reliable, exactly-once delivery with independent random
//!    delays, so messages overtake each other freely
//!
//! The [`MutexEngine`] owns all nodes and in-flight messages. A [`Driver`]
//! ticks it periodically, [`Simulation`] bundles both behind the command
//! surface a host calls, and [`LiveDriver`] runs that on a wall clock.

pub mod clock;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod event;
pub mod live;
pub mod message;
pub mod node;
pub mod simulation;
pub mod snapshot;
pub mod transport;

// Re-export key types for convenience
pub use clock::{LamportClock, Timestamp};
pub use config::{DeliveryOrder, DriverConfig, EngineConfig, SimulationConfig};
pub use driver::{Driver, TickReport};
pub use engine::MutexEngine;
pub use error::ConfigError;
pub use event::{CommandOutcome, EngineEvent, IgnoreReason};
pub use live::{LiveDriver, RunState};
pub use message::{Message, MessageId, MessageKind, Ticket};
pub use node::{Node, NodeState};
pub use simulation::Simulation;
pub use snapshot::{EngineStats, Snapshot};
pub use transport::{ConstantLatency, LatencyModel, Transport, UniformLatency};
pub use ricart_env::NodeId;
