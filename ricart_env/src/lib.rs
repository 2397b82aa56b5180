//! Ricart-Agrawala Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the mutual-exclusion
//! engine be driven either by **wall-clock time** (tokio) or by a
//! **virtual clock** inside the deterministic simulation harness.
//!
//! # Core Concept: The Reactor Pattern
//!
//! Everything that would make a run non-reproducible is routed through the
//! context:
//! - Time (`now()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - The master seed (`seed()`)
//!
//! # Example
//!
//! ```ignore
//! use ricart_env::RicartContext;
//!
//! async fn driver_loop<Ctx: RicartContext>(ctx: &Ctx, period: Duration) {
//!     loop {
//!         ctx.sleep(period).await;
//!         tick();
//!     }
//! }
//! ```

mod context;
mod types;
mod error;
mod tokio_impl;

pub use context::RicartContext;
pub use types::NodeId;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
