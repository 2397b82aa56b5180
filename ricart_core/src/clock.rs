//! Lamport logical clock.
//!
//! Every node owns one scalar clock. It advances on every local send and on
//! every receive, where it first absorbs the sender's timestamp:
//!
//! ```text
//! C := max(C, received) + 1
//! ```
//!
//! A local event is the same rule with `received = 0`.

use serde::{Deserialize, Serialize};

/// A Lamport timestamp.
pub type Timestamp = u64;

/// Scalar Lamport clock. Never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LamportClock {
    value: Timestamp,
}

impl LamportClock {
    /// Creates a clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock value.
    pub fn value(&self) -> Timestamp {
        self.value
    }

    /// Merges `received` and advances, returning the new value.
    pub fn tick(&mut self, received: Timestamp) -> Timestamp {
        self.value = self.value.max(received).saturating_add(1);
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_tick_increments() {
        let mut clock = LamportClock::new();
        assert_eq!(clock.tick(0), 1);
        assert_eq!(clock.tick(0), 2);
        assert_eq!(clock.value(), 2);
    }

    #[test]
    fn test_receive_merges_larger_timestamp() {
        let mut clock = LamportClock::new();
        clock.tick(0);
        assert_eq!(clock.tick(10), 11);
    }

    #[test]
    fn test_receive_of_stale_timestamp_still_advances() {
        let mut clock = LamportClock::new();
        clock.tick(9);
        assert_eq!(clock.tick(3), 11);
    }
}
