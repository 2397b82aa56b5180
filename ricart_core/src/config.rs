//! Configuration for the engine and the periodic driver.
//!
//! Everything here is plain data with sensible defaults. A full
//! [`SimulationConfig`] can be loaded from JSON; missing fields fall back to
//! their defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How the transport orders messages whose deadlines coincide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOrder {
    /// Send order
    Fifo,
    /// Random order drawn from the transport's seeded RNG
    #[default]
    Shuffled,
}

/// Engine and transport parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest accepted node count (default: 2)
    pub min_nodes: usize,

    /// Largest accepted node count (default: 32)
    pub max_nodes: usize,

    /// Lower bound of the simulated network delay
    pub latency_min_ms: u64,

    /// Upper bound of the simulated network delay
    pub latency_max_ms: u64,

    /// Processing delay before an immediate REPLY leaves the node
    pub reply_delay_ms: u64,

    /// Delivered messages kept for display
    pub history_limit: usize,

    /// Undrained engine events kept before the oldest are dropped
    pub event_limit: usize,

    pub delivery_order: DeliveryOrder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_nodes: 2,
            max_nodes: 32,
            latency_min_ms: 200,
            latency_max_ms: 1200,
            reply_delay_ms: 100,
            history_limit: 256,
            event_limit: 4096,
            delivery_order: DeliveryOrder::Shuffled,
        }
    }
}

impl EngineConfig {
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    /// Checks `count` against the supported node range.
    pub fn check_node_count(&self, count: usize) -> Result<(), ConfigError> {
        if count < self.min_nodes || count > self.max_nodes {
            return Err(ConfigError::NodeCount {
                count,
                min: self.min_nodes,
                max: self.max_nodes,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_nodes < 2 {
            return Err(ConfigError::MinNodes(self.min_nodes));
        }
        if self.latency_min_ms > self.latency_max_ms {
            return Err(ConfigError::LatencyBounds {
                min_ms: self.latency_min_ms,
                max_ms: self.latency_max_ms,
            });
        }
        Ok(())
    }
}

/// Simulation policy: how often the driver ticks and what it does per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Driver period (default: 1000ms)
    pub tick_period_ms: u64,

    /// Per-tick chance that an idle node requests the critical section
    pub request_probability: f64,

    /// Ticks a node stays inside the critical section (default: 3)
    pub critical_section_ticks: u32,

    /// Disable to drive requests purely by external commands
    pub auto_request: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1000,
            request_probability: 0.1,
            critical_section_ticks: 3,
            auto_request: true,
        }
    }
}

impl DriverConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if !(0.0..=1.0).contains(&self.request_probability) {
            return Err(ConfigError::RequestProbability(self.request_probability));
        }
        if self.critical_section_ticks == 0 {
            return Err(ConfigError::ZeroCriticalSection);
        }
        Ok(())
    }
}

/// Top-level configuration of one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of nodes created at start-up
    pub node_count: usize,

    /// Master seed; every random stream is derived from it
    pub seed: u64,

    pub engine: EngineConfig,
    pub driver: DriverConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: 3,
            seed: 42,
            engine: EngineConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Loads a JSON configuration file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.driver.validate()?;
        self.engine.check_node_count(self.node_count)
    }

    pub fn with_nodes(mut self, node_count: usize) -> Self {
        self.node_count = node_count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_request_probability(mut self, probability: f64) -> Self {
        self.driver.request_probability = probability;
        self
    }

    pub fn with_auto_request(mut self, enabled: bool) -> Self {
        self.driver.auto_request = enabled;
        self
    }

    pub fn with_critical_section_ticks(mut self, ticks: u32) -> Self {
        self.driver.critical_section_ticks = ticks;
        self
    }

    pub fn with_latency_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.engine.latency_min_ms = min_ms;
        self.engine.latency_max_ms = max_ms;
        self
    }

    pub fn with_reply_delay_ms(mut self, delay_ms: u64) -> Self {
        self.engine.reply_delay_ms = delay_ms;
        self
    }

    pub fn with_delivery_order(mut self, order: DeliveryOrder) -> Self {
        self.engine.delivery_order = order;
        self
    }
}
