//! Ricart-Agrawala Deterministic Simulation Testing (DST) Harness
//!
//! Runs the mutual-exclusion engine against a virtual clock and checks every
//! tick against an independent oracle.
//!
//! # Core Principle
//!
//! All sources of non-determinism are controlled:
//! - **Time**: Virtual clock advances one driver period per step
//! - **Network**: Latency models with jitter and per-link slowdowns
//! - **Randomness**: All entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      SimWorld                        │
//! │  ┌────────────┐   ┌──────────────────────────────┐   │
//! │  │ SimContext │──►│ Simulation (engine + driver) │   │
//! │  └────────────┘   └──────────────┬───────────────┘   │
//! │  ┌─────────────────────┐         │ events, snapshot  │
//! │  │ SimNetworkController│──►      ▼                   │
//! │  │   (LinkLatency)     │   ┌──────────────┐          │
//! │  └─────────────────────┘   │ SafetyOracle │          │
//! │                            └──────────────┘          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ricart_sim::{SimWorld, SimConfig};
//!
//! let mut world = SimWorld::new(SimConfig {
//!     seed: 42,
//!     num_nodes: 6,
//!     ..Default::default()
//! })?;
//! world.run(100);
//! assert!(world.drain(200));
//! assert!(world.oracle.is_clean());
//! ```

mod context;
mod exporter;
mod network;
mod oracle;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{SimExport, SimFrame};
pub use network::{JitterLatency, LinkLatency, SimNetworkController};
pub use oracle::{OracleViolation, SafetyOracle};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{LatencyProfile, SimConfig, SimWorld};
