//! JSON exporter for replaying a run outside the simulator.
//!
//! Each frame holds the full snapshot after one tick plus the events that
//! led to it, so a viewer can step through the run without re-simulating.

use ricart_core::{EngineEvent, Snapshot};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single frame of simulation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimFrame {
    pub tick: u64,

    /// Simulation time in seconds
    pub time_sec: f64,

    pub snapshot: Snapshot,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EngineEvent>,
}

/// Complete simulation export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    pub node_count: usize,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, node_count: usize) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            node_count,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            violations: Vec::new(),
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, violations: Vec<String>) {
        self.passed = passed;
        self.violations = violations;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricart_core::{Simulation, SimulationConfig};

    #[test]
    fn test_frames_track_duration() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        let mut export = SimExport::new("steady", 42, 3);

        for _ in 0..3 {
            let report = sim.tick();
            export.add_frame(SimFrame {
                tick: report.tick,
                time_sec: report.now.as_secs_f64(),
                snapshot: sim.snapshot(),
                events: report.events,
            });
        }
        export.finalize(true, vec![]);

        assert_eq!(export.frames.len(), 3);
        assert_eq!(export.duration_sec, 3.0);

        let json = serde_json::to_string(&export).unwrap();
        let back: SimExport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, export);
    }
}
