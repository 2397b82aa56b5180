//! Error types for configuration misuse.
//!
//! Protocol events never fail; only the public configuration surface does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Node count {count} outside supported range {min}..={max}")]
    NodeCount { count: usize, min: usize, max: usize },

    #[error("Minimum node count must be at least 2, got {0}")]
    MinNodes(usize),

    #[error("Request probability {0} must be within [0, 1]")]
    RequestProbability(f64),

    #[error("Latency bounds inverted: min {min_ms}ms > max {max_ms}ms")]
    LatencyBounds { min_ms: u64, max_ms: u64 },

    #[error("Tick period must be non-zero")]
    ZeroTickPeriod,

    #[error("Critical section must last at least one tick")]
    ZeroCriticalSection,

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
