//! Latency injection for the simulated transport.
//!
//! The engine's transport never drops or duplicates messages; the only
//! network fault worth injecting is delay. `JitterLatency` gives a heavy
//! spread around a mean and `SimNetworkController` slows individual links
//! while a scenario runs.

use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use ricart_core::{LatencyModel, MessageKind};
use ricart_env::NodeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Normally distributed delay, clamped to `[min_ms, max_ms]`.
pub struct JitterLatency {
    mean_ms: f64,
    std_dev_ms: f64,
    min_ms: u64,
    max_ms: u64,
    rng: ChaCha8Rng,
}

impl JitterLatency {
    pub fn new(mean_ms: f64, std_dev_ms: f64, min_ms: u64, max_ms: u64, rng: ChaCha8Rng) -> Self {
        // A negative or NaN deviation collapses to a point distribution.
        let std_dev_ms = if std_dev_ms.is_finite() { std_dev_ms.max(0.0) } else { 0.0 };

        Self {
            mean_ms,
            std_dev_ms,
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
            rng,
        }
    }
}

impl LatencyModel for JitterLatency {
    fn sample(&mut self, _from: NodeId, _to: NodeId, _kind: MessageKind) -> Duration {
        let z: f64 = StandardNormal.sample(&mut self.rng);
        let ms = (self.mean_ms + self.std_dev_ms * z).round();
        let clamped = if ms.is_finite() {
            (ms.max(0.0) as u64).clamp(self.min_ms, self.max_ms)
        } else {
            self.min_ms
        };
        Duration::from_millis(clamped)
    }
}

/// Network controller for latency injection.
///
/// Clones share state, so a scenario can keep a handle while the engine
/// owns the [`LinkLatency`] that reads it.
#[derive(Clone, Default)]
pub struct SimNetworkController {
    /// Extra per-link latency in milliseconds
    link_latency: Arc<Mutex<HashMap<(NodeId, NodeId), u64>>>,
}

impl SimNetworkController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets extra latency for a specific directed link.
    pub fn set_latency(&self, from: NodeId, to: NodeId, latency_ms: u64) {
        let mut latencies = self.link_latency.lock().unwrap_or_else(PoisonError::into_inner);
        latencies.insert((from, to), latency_ms);
    }

    /// Slows every link into and out of `node`.
    pub fn slow_node(&self, node: NodeId, peers: &[NodeId], latency_ms: u64) {
        for &peer in peers.iter().filter(|&&p| p != node) {
            self.set_latency(node, peer, latency_ms);
            self.set_latency(peer, node, latency_ms);
        }
    }

    /// Gets the extra latency for a link (default 0).
    pub fn get_latency(&self, from: NodeId, to: NodeId) -> u64 {
        let latencies = self.link_latency.lock().unwrap_or_else(PoisonError::into_inner);
        latencies.get(&(from, to)).copied().unwrap_or(0)
    }

    /// Removes all per-link overrides.
    pub fn clear(&self) {
        self.link_latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A base latency model plus the controller's per-link overrides.
pub struct LinkLatency<M> {
    base: M,
    controller: SimNetworkController,
}

impl<M: LatencyModel> LinkLatency<M> {
    pub fn new(base: M, controller: SimNetworkController) -> Self {
        Self { base, controller }
    }
}

impl<M: LatencyModel> LatencyModel for LinkLatency<M> {
    fn sample(&mut self, from: NodeId, to: NodeId, kind: MessageKind) -> Duration {
        self.base.sample(from, to, kind)
            + Duration::from_millis(self.controller.get_latency(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use ricart_core::ConstantLatency;

    #[test]
    fn test_network_controller_latency() {
        let controller = SimNetworkController::new();
        let a = NodeId(1);
        let b = NodeId(2);

        assert_eq!(controller.get_latency(a, b), 0);

        controller.set_latency(a, b, 100);
        assert_eq!(controller.get_latency(a, b), 100);

        // Reverse direction is separate
        assert_eq!(controller.get_latency(b, a), 0);

        controller.clear();
        assert_eq!(controller.get_latency(a, b), 0);
    }

    #[test]
    fn test_slow_node_touches_both_directions() {
        let controller = SimNetworkController::new();
        let peers: Vec<NodeId> = (0..3).map(NodeId).collect();

        controller.slow_node(NodeId(0), &peers, 500);

        assert_eq!(controller.get_latency(NodeId(0), NodeId(2)), 500);
        assert_eq!(controller.get_latency(NodeId(1), NodeId(0)), 500);
        assert_eq!(controller.get_latency(NodeId(1), NodeId(2)), 0);
        assert_eq!(controller.get_latency(NodeId(0), NodeId(0)), 0);
    }

    #[test]
    fn test_link_latency_adds_override() {
        let controller = SimNetworkController::new();
        let mut model = LinkLatency::new(
            ConstantLatency(Duration::from_millis(10)),
            controller.clone(),
        );

        controller.set_latency(NodeId(0), NodeId(1), 40);

        assert_eq!(
            model.sample(NodeId(0), NodeId(1), MessageKind::Request),
            Duration::from_millis(50)
        );
        assert_eq!(
            model.sample(NodeId(1), NodeId(0), MessageKind::Reply),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut model = JitterLatency::new(600.0, 900.0, 50, 1500, ChaCha8Rng::seed_from_u64(3));

        for _ in 0..1000 {
            let d = model.sample(NodeId(0), NodeId(1), MessageKind::Request);
            assert!(d >= Duration::from_millis(50));
            assert!(d <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_zero_deviation_is_constant() {
        let mut model = JitterLatency::new(300.0, 0.0, 0, 1000, ChaCha8Rng::seed_from_u64(1));
        for _ in 0..10 {
            assert_eq!(
                model.sample(NodeId(0), NodeId(1), MessageKind::Reply),
                Duration::from_millis(300)
            );
        }
    }
}
