//! Periodic simulation driver.
//!
//! The driver is a policy layer: it decides *when* things happen (timers
//! expiring, idle nodes asking for the critical section) but all state
//! changes go through the engine's public operations. Replacing it with
//! manual commands does not affect any protocol guarantee.

use crate::config::DriverConfig;
use crate::engine::MutexEngine;
use crate::event::EngineEvent;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ricart_env::NodeId;
use std::time::Duration;
use tracing::trace;

/// What happened during one driver tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub tick: u64,
    pub now: Duration,
    pub delivered: usize,

    /// Nodes whose critical-section timer expired this tick
    pub released: Vec<NodeId>,

    /// Idle nodes that issued a new request this tick
    pub requested: Vec<NodeId>,

    /// Engine events recorded since the previous tick
    pub events: Vec<EngineEvent>,
}

pub struct Driver {
    config: DriverConfig,
    rng: ChaCha8Rng,
    ticks: u64,
}

impl Driver {
    pub fn new(config: DriverConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            ticks: 0,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn reset(&mut self) {
        self.ticks = 0;
    }

    pub fn set_auto_request(&mut self, enabled: bool) {
        self.config.auto_request = enabled;
    }

    /// Runs one period ending at `now`:
    /// 1. deliver everything due,
    /// 2. count down occupied critical sections and release expired ones,
    /// 3. let each idle node request with the configured probability.
    pub fn tick(&mut self, engine: &mut MutexEngine, now: Duration) -> TickReport {
        let delivered = engine.deliver_due(now);
        let released = engine.countdown_critical_sections();

        let mut requested = Vec::new();
        if self.config.auto_request && self.config.request_probability > 0.0 {
            for id in engine.idle_nodes() {
                if self.rng.gen_bool(self.config.request_probability)
                    && engine.request_cs(id).is_accepted()
                {
                    requested.push(id);
                }
            }
        }

        self.ticks += 1;
        trace!(
            tick = self.ticks,
            delivered,
            released = released.len(),
            requested = requested.len(),
            "driver tick"
        );

        TickReport {
            tick: self.ticks,
            now,
            delivered,
            released,
            requested,
            events: engine.drain_events(),
        }
    }
}
