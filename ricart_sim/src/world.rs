//! SimWorld - The simulation harness container.
//!
//! Wires a [`Simulation`] to the virtual clock, the latency controller and
//! the safety oracle. Every tick goes through [`SimWorld::step`], which
//! feeds the oracle the tick's events and the resulting snapshot.

use crate::context::SimContext;
use crate::exporter::{SimExport, SimFrame};
use crate::network::{JitterLatency, LinkLatency, SimNetworkController};
use crate::oracle::SafetyOracle;

use ricart_core::{
    CommandOutcome, ConfigError, LatencyModel, Simulation, SimulationConfig, TickReport,
    UniformLatency,
};
use ricart_env::{NodeId, RicartContext};
use std::sync::Arc;
use tracing::debug;

/// Random stream feeding the latency model.
const LATENCY_STREAM: u64 = 1;

/// Shape of the per-message delay distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyProfile {
    /// Uniform between the engine's configured bounds
    Uniform,

    /// Normal around `mean_ms`, clamped to `[min_ms, max_ms]`
    Jitter {
        mean_ms: f64,
        std_dev_ms: f64,
        min_ms: u64,
        max_ms: u64,
    },
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    pub num_nodes: usize,

    /// Engine and driver settings; seed and node count are taken from above
    pub simulation: SimulationConfig,

    pub latency: LatencyProfile,

    /// Record a frame per tick for export
    pub record_frames: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_nodes: 3,
            simulation: SimulationConfig::default(),
            latency: LatencyProfile::Uniform,
            record_frames: false,
        }
    }
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    pub simulation: Simulation,

    /// Invariant checker
    pub oracle: SafetyOracle,

    /// Network controller for latency injection
    pub network_controller: SimNetworkController,

    export: Option<SimExport>,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let sim_config = config
            .simulation
            .clone()
            .with_seed(config.seed)
            .with_nodes(config.num_nodes);

        let context = SimContext::shared(config.seed);
        let network_controller = SimNetworkController::new();

        let latency: Box<dyn LatencyModel> = match config.latency {
            LatencyProfile::Uniform => Box::new(LinkLatency::new(
                UniformLatency::new(
                    sim_config.engine.latency_min_ms,
                    sim_config.engine.latency_max_ms,
                    context.stream_seed(LATENCY_STREAM),
                ),
                network_controller.clone(),
            )),
            LatencyProfile::Jitter {
                mean_ms,
                std_dev_ms,
                min_ms,
                max_ms,
            } => Box::new(LinkLatency::new(
                JitterLatency::new(
                    mean_ms,
                    std_dev_ms,
                    min_ms,
                    max_ms,
                    context.derive_rng(LATENCY_STREAM),
                ),
                network_controller.clone(),
            )),
        };

        let mut simulation = Simulation::new(sim_config)?.with_latency_model(latency);

        let mut oracle = SafetyOracle::new();
        oracle.observe_events(&simulation.engine_mut().drain_events());
        oracle.observe_snapshot(&simulation.snapshot());

        let export = config
            .record_frames
            .then(|| SimExport::new("custom", config.seed, config.num_nodes));

        Ok(Self {
            config,
            context,
            simulation,
            oracle,
            network_controller,
            export,
        })
    }

    /// Labels the export with a scenario name.
    pub fn set_export_label(&mut self, scenario: &str) {
        if let Some(export) = &mut self.export {
            export.scenario = scenario.to_string();
        }
    }

    /// Advances virtual time by one driver period and ticks the simulation.
    pub fn step(&mut self) -> TickReport {
        self.context.advance_time(self.simulation.tick_period());
        let report = self.simulation.tick_at(self.context.now());

        self.oracle.observe_events(&report.events);
        let snapshot = self.simulation.snapshot();
        self.oracle.observe_snapshot(&snapshot);

        if let Some(export) = &mut self.export {
            export.add_frame(SimFrame {
                tick: report.tick,
                time_sec: report.now.as_secs_f64(),
                snapshot,
                events: report.events.clone(),
            });
        }

        report
    }

    /// Runs a fixed number of ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Ticks until `done` holds, at most `max_ticks` times.
    pub fn run_until<F>(&mut self, max_ticks: u64, mut done: F) -> bool
    where
        F: FnMut(&SimWorld) -> bool,
    {
        for _ in 0..max_ticks {
            if done(self) {
                return true;
            }
            self.step();
        }
        done(self)
    }

    /// Stops new requests and ticks until every node is idle with nothing
    /// in flight. Returns false if that did not happen within `max_ticks`.
    pub fn drain(&mut self, max_ticks: u64) -> bool {
        self.simulation.driver_mut().set_auto_request(false);
        let quiet = self.run_until(max_ticks, |w| w.simulation.engine().is_quiescent());
        debug!(quiet, ticks = self.tick_count(), "drain finished");
        quiet
    }

    pub fn request_cs(&mut self, id: NodeId) -> CommandOutcome {
        self.simulation.request_cs(id)
    }

    pub fn release_cs(&mut self, id: NodeId) -> CommandOutcome {
        self.simulation.release_cs(id)
    }

    /// Takes the recorded export, stamped with the oracle's verdict.
    pub fn finish_export(&mut self, passed: bool) -> Option<SimExport> {
        let violations = self
            .oracle
            .violations()
            .iter()
            .map(ToString::to_string)
            .collect();
        self.export.take().map(|mut export| {
            export.finalize(passed, violations);
            export
        })
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.simulation.engine().node_count())
            .map(NodeId::from_index)
            .collect()
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.simulation.ticks()
    }
}
