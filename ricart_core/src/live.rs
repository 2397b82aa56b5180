//! Wall-clock driver for hosts that want the simulation to run by itself.
//!
//! The simulation lives behind an async mutex shared with a background task
//! that calls [`Simulation::tick`] once per period. Commands issued through
//! the handle take the same lock, so each one is atomic with respect to a
//! tick.
//!
//! ```text
//!   host ──pause/resume/stop──► watch ──► tick loop ──lock──► Simulation
//!   host ──request/release/snapshot──────────────────lock──►
//! ```
//!
//! Stopping only ends the loop. Nodes, in-flight messages and held critical
//! sections stay exactly as they were and can still be inspected or driven
//! by hand.

use crate::error::ConfigError;
use crate::event::CommandOutcome;
use crate::simulation::Simulation;
use crate::snapshot::Snapshot;
use ricart_env::{EnvError, NodeId, RicartContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, info};

/// Lifecycle of the background tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Stopped,
}

/// Handle to a simulation ticking on a background task.
pub struct LiveDriver {
    simulation: Arc<Mutex<Simulation>>,
    control: watch::Sender<RunState>,
    finished: Option<oneshot::Receiver<()>>,
}

impl LiveDriver {
    /// Spawns the tick loop on `context` in the `Running` state.
    pub fn start<Ctx: RicartContext>(context: Arc<Ctx>, simulation: Simulation) -> Self {
        let period = simulation.tick_period();
        let simulation = Arc::new(Mutex::new(simulation));
        let (control, control_rx) = watch::channel(RunState::Running);
        let (done_tx, done_rx) = oneshot::channel();

        let loop_ctx = Arc::clone(&context);
        let loop_sim = Arc::clone(&simulation);
        context.spawn("ricart-driver", async move {
            run_loop(loop_ctx, loop_sim, control_rx, period).await;
            let _ = done_tx.send(());
        });

        info!(period_ms = period.as_millis() as u64, "live driver started");

        Self {
            simulation,
            control,
            finished: Some(done_rx),
        }
    }

    pub fn state(&self) -> RunState {
        *self.control.borrow()
    }

    /// Suspends ticking; the current tick, if any, completes first.
    pub fn pause(&self) -> Result<(), EnvError> {
        self.set_state(RunState::Paused)
    }

    pub fn resume(&self) -> Result<(), EnvError> {
        if self.state() == RunState::Stopped {
            return Err(EnvError::context("driver already stopped"));
        }
        self.set_state(RunState::Running)
    }

    /// Ends the tick loop and waits for it to exit. State is left intact.
    pub async fn stop(&mut self) -> Result<(), EnvError> {
        if self.state() != RunState::Stopped {
            // The loop may already be gone; there is nothing left to stop then.
            let _ = self.control.send(RunState::Stopped);
        }
        if let Some(finished) = self.finished.take() {
            finished
                .await
                .map_err(|_| EnvError::closed("driver task ended without reporting"))?;
        }
        Ok(())
    }

    fn set_state(&self, state: RunState) -> Result<(), EnvError> {
        self.control
            .send(state)
            .map_err(|_| EnvError::closed("driver control"))?;
        debug!(?state, "driver state changed");
        Ok(())
    }

    pub async fn request_cs(&self, id: NodeId) -> CommandOutcome {
        self.simulation.lock().await.request_cs(id)
    }

    pub async fn release_cs(&self, id: NodeId) -> CommandOutcome {
        self.simulation.lock().await.release_cs(id)
    }

    /// Rebuilds the node set in place; the loop keeps its run state.
    pub async fn reset(&self, node_count: usize) -> Result<(), ConfigError> {
        self.simulation.lock().await.initialize(node_count)
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.simulation.lock().await.snapshot()
    }

    pub async fn ticks(&self) -> u64 {
        self.simulation.lock().await.ticks()
    }

    /// Shared handle to the underlying simulation.
    pub fn simulation(&self) -> Arc<Mutex<Simulation>> {
        Arc::clone(&self.simulation)
    }
}

async fn run_loop<Ctx: RicartContext>(
    context: Arc<Ctx>,
    simulation: Arc<Mutex<Simulation>>,
    mut control: watch::Receiver<RunState>,
    period: Duration,
) {
    loop {
        let state = *control.borrow_and_update();
        match state {
            RunState::Stopped => break,
            RunState::Paused => {
                if control.changed().await.is_err() {
                    break;
                }
                continue;
            }
            RunState::Running => {}
        }

        tokio::select! {
            _ = context.sleep(period) => {}
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
                // Re-evaluate the state before ticking.
                continue;
            }
        }

        let report = simulation.lock().await.tick();
        debug!(
            tick = report.tick,
            delivered = report.delivered,
            requested = report.requested.len(),
            released = report.released.len(),
            "live tick"
        );
    }

    info!("live driver stopped");
}
