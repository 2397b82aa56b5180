//! Scenario runner - executes Ricart-Agrawala test scenarios.
//!
//! Every scenario ends the same way: auto-requests are switched off, the
//! world is ticked until quiescent, and the oracle's verdict is combined
//! with the scenario's own checks.

use crate::exporter::SimExport;
use crate::scenarios::ScenarioId;
use crate::world::{LatencyProfile, SimConfig, SimWorld};

use ricart_core::{DeliveryOrder, SimulationConfig};
use ricart_env::NodeId;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed, drain included
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    pub node_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioMetrics {
    pub requests_sent: u64,
    pub replies_sent: u64,

    /// REPLYs withheld by the decision rule
    pub deferred_replies: u64,

    /// Critical-section entries observed by the oracle
    pub cs_entries: u64,

    /// Longest request-to-entry wait (ms)
    pub max_wait_ms: u64,

    pub mean_wait_ms: u64,

    /// Ticks spent draining after the load phase
    pub drain_ticks: u64,

    pub violations: usize,
}

impl ScenarioMetrics {
    pub fn messages_sent(&self) -> u64 {
        self.requests_sent + self.replies_sent
    }
}

impl ScenarioResult {
    /// One entry of the CLI's JSON summary.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "scenario": self.scenario.name(),
            "description": self.scenario.description(),
            "seed": self.seed,
            "nodes": self.node_count,
            "passed": self.passed,
            "ticks": self.total_ticks,
            "time_secs": self.final_time_secs,
            "entries": self.metrics.cs_entries,
            "messages": self.metrics.messages_sent(),
            "deferred": self.metrics.deferred_replies,
            "max_wait_ms": self.metrics.max_wait_ms,
            "mean_wait_ms": self.metrics.mean_wait_ms,
            "drain_ticks": self.metrics.drain_ticks,
            "violations": self.metrics.violations,
            "failure_reason": self.failure_reason,
        })
    }
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    num_nodes: usize,

    /// Load-phase ticks
    ticks: u64,

    /// Settings each scenario starts from
    base: SimulationConfig,

    record_frames: bool,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_nodes: usize) -> Self {
        Self {
            seed,
            num_nodes,
            ticks: 120,
            base: SimulationConfig::default(),
            record_frames: false,
        }
    }

    /// Sets the number of load-phase ticks.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self
    }

    /// Uses `config` as the starting point instead of the defaults.
    pub fn with_base_config(mut self, config: SimulationConfig) -> Self {
        self.base = config;
        self
    }

    /// Records one frame per tick for export.
    pub fn with_export(mut self, enabled: bool) -> Self {
        self.record_frames = enabled;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_with_export(scenario).0
    }

    /// Runs a scenario, also returning the recorded frames when enabled.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut world = match self.build_world(scenario) {
            Ok(world) => world,
            Err(e) => {
                warn!("✗ {}: invalid configuration: {}", scenario.name(), e);
                let result = ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: false,
                    total_ticks: 0,
                    final_time_secs: 0.0,
                    node_count: self.nodes_for(scenario),
                    failure_reason: Some(format!("invalid configuration: {}", e)),
                    metrics: ScenarioMetrics::default(),
                };
                return (result, None);
            }
        };

        let (check, drain_ticks) = match scenario {
            ScenarioId::Steady | ScenarioId::Contention | ScenarioId::Stress => {
                self.run_load(&mut world)
            }
            ScenarioId::TieBreak => self.run_tie_break(&mut world),
            ScenarioId::Jitter => self.run_jitter(&mut world),
            ScenarioId::Solo => self.run_solo(&mut world),
        };

        self.finish(scenario, world, check, drain_ticks)
    }

    fn nodes_for(&self, scenario: ScenarioId) -> usize {
        match scenario {
            ScenarioId::Stress => self.num_nodes.max(12).min(self.base.engine.max_nodes),
            _ => self.num_nodes,
        }
    }

    fn build_world(&self, scenario: ScenarioId) -> Result<SimWorld, ricart_core::ConfigError> {
        let base = self
            .base
            .clone()
            .with_auto_request(scenario.auto_requests());

        let (simulation, latency) = match scenario {
            ScenarioId::Steady | ScenarioId::TieBreak | ScenarioId::Solo => {
                (base, LatencyProfile::Uniform)
            }
            ScenarioId::Contention => (base.with_request_probability(0.6), LatencyProfile::Uniform),
            ScenarioId::Jitter => (
                base.with_request_probability(0.2)
                    .with_delivery_order(DeliveryOrder::Shuffled),
                LatencyProfile::Jitter {
                    mean_ms: 700.0,
                    std_dev_ms: 500.0,
                    min_ms: 1,
                    max_ms: 2500,
                },
            ),
            ScenarioId::Stress => (
                base.with_request_probability(0.5)
                    .with_reply_delay_ms(0)
                    .with_latency_ms(0, 2000),
                LatencyProfile::Uniform,
            ),
        };

        let mut world = SimWorld::new(SimConfig {
            seed: self.seed,
            num_nodes: self.nodes_for(scenario),
            simulation,
            latency,
            record_frames: self.record_frames,
        })?;
        world.set_export_label(scenario.name());
        Ok(world)
    }

    /// Upper bound on ticks needed to serve every queued request.
    fn drain_limit(world: &SimWorld) -> u64 {
        world.node_ids().len() as u64 * 25 + 50
    }

    /// Ticks until quiescent; fails if requests are still unserved.
    fn drain(world: &mut SimWorld) -> (Result<(), String>, u64) {
        let start = world.tick_count();
        let quiet = world.drain(Self::drain_limit(world));
        let spent = world.tick_count() - start;

        let check = if !quiet {
            Err(format!(
                "not quiescent after {} drain ticks ({} requests outstanding)",
                spent,
                world.oracle.outstanding_requests()
            ))
        } else if world.oracle.outstanding_requests() > 0 {
            Err(format!(
                "{} requests never entered the critical section",
                world.oracle.outstanding_requests()
            ))
        } else {
            Ok(())
        };
        (check, spent)
    }

    /// RA-001/002/006: random load, then drain.
    fn run_load(&self, world: &mut SimWorld) -> (Result<(), String>, u64) {
        for tick in 0..self.ticks {
            let report = world.step();
            if tick % 10 == 0 {
                debug!(
                    "  t={:.1}s | delivered={} | holder={:?} | in_flight={}",
                    world.time(),
                    report.delivered,
                    world.oracle.holder(),
                    world.simulation.engine().transport().in_flight_count()
                );
            }
        }
        Self::drain(world)
    }

    /// RA-003: every node requests before the first tick, so all tickets
    /// share timestamp 1 and only node ids decide the order.
    fn run_tie_break(&self, world: &mut SimWorld) -> (Result<(), String>, u64) {
        let ids = world.node_ids();
        for &id in &ids {
            world.request_cs(id);
        }

        let (check, spent) = Self::drain(world);
        if check.is_err() {
            return (check, spent);
        }

        let order: Vec<NodeId> = world.oracle.entry_log().iter().map(|(n, _)| *n).collect();
        if order != ids {
            return (Err(format!("entries out of id order: {:?}", order)), spent);
        }
        if let Some((node, ticket)) = world
            .oracle
            .entry_log()
            .iter()
            .find(|(_, t)| t.timestamp != 1)
        {
            return (
                Err(format!("{} entered with {}, expected timestamp 1", node, ticket)),
                spent,
            );
        }
        (Ok(()), spent)
    }

    /// RA-004: heavy jitter and node 0 slowed by 1.5s on every link.
    fn run_jitter(&self, world: &mut SimWorld) -> (Result<(), String>, u64) {
        let ids = world.node_ids();
        world.network_controller.slow_node(NodeId(0), &ids, 1500);
        info!("  ⏳ Slowed every link of {} by 1500ms", NodeId(0));
        self.run_load(world)
    }

    /// RA-005: the last node requests alone and must hear from every peer.
    fn run_solo(&self, world: &mut SimWorld) -> (Result<(), String>, u64) {
        let ids = world.node_ids();
        let Some(&requester) = ids.last() else {
            return (Err("no nodes".to_string()), 0);
        };

        if !world.request_cs(requester).is_accepted() {
            return (Err(format!("{} refused to request", requester)), 0);
        }

        let limit = Self::drain_limit(world);
        let entered = world.run_until(limit, |w| w.oracle.holder() == Some(requester));
        if !entered {
            return (Err(format!("{} never entered", requester)), 0);
        }

        let (check, spent) = Self::drain(world);
        if check.is_err() {
            return (check, spent);
        }

        let peers = ids.len() as u64 - 1;
        let stats = world.simulation.engine().stats();
        if stats.requests_sent != peers || stats.replies_sent != peers {
            return (
                Err(format!(
                    "expected {} requests and {} replies, saw {} and {}",
                    peers, peers, stats.requests_sent, stats.replies_sent
                )),
                spent,
            );
        }
        if stats.deferred != 0 {
            return (Err(format!("{} replies deferred with no rival", stats.deferred)), spent);
        }
        (Ok(()), spent)
    }

    fn finish(
        &self,
        scenario: ScenarioId,
        mut world: SimWorld,
        check: Result<(), String>,
        drain_ticks: u64,
    ) -> (ScenarioResult, Option<SimExport>) {
        let stats = world.simulation.engine().stats().clone();
        let oracle = &world.oracle;

        let metrics = ScenarioMetrics {
            requests_sent: stats.requests_sent,
            replies_sent: stats.replies_sent,
            deferred_replies: stats.deferred,
            cs_entries: oracle.entries() as u64,
            max_wait_ms: oracle.max_wait().as_millis() as u64,
            mean_wait_ms: oracle.mean_wait().as_millis() as u64,
            drain_ticks,
            violations: oracle.violations().len(),
        };

        let failure_reason = match (check, oracle.violations().first()) {
            (_, Some(violation)) => Some(violation.to_string()),
            (Err(reason), None) => Some(reason),
            (Ok(()), None) => None,
        };
        let passed = failure_reason.is_none();

        if passed {
            info!(
                "✓ {} complete: {} entries, {} messages, {} deferred, max wait {}ms",
                scenario.name(),
                metrics.cs_entries,
                metrics.messages_sent(),
                metrics.deferred_replies,
                metrics.max_wait_ms
            );
        } else {
            warn!(
                "✗ {} failed: {}",
                scenario.name(),
                failure_reason.as_deref().unwrap_or("unknown")
            );
        }

        let export = world.finish_export(passed);
        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: world.tick_count(),
            final_time_secs: world.time(),
            node_count: world.node_ids().len(),
            failure_reason,
            metrics,
        };
        (result, export)
    }
}
