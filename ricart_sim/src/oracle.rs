//! Safety Oracle - ground truth checks over engine events and snapshots.
//!
//! The oracle never touches the engine. It replays the event stream to
//! track who holds the critical section and inspects each snapshot for
//! states a correct node can never be in.

use ricart_core::{EngineEvent, NodeState, Snapshot, Ticket, Timestamp};
use ricart_env::NodeId;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// A broken protocol invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleViolation {
    #[error("{intruder} entered at {at:?} while {holder} held the critical section")]
    MutualExclusion {
        holder: NodeId,
        intruder: NodeId,
        at: Duration,
    },

    #[error("{node} entered with {ticket} while {waiting} waited with older {older}")]
    OrderInversion {
        node: NodeId,
        ticket: Ticket,
        waiting: NodeId,
        older: Ticket,
    },

    #[error("{node} released a critical section it was not recorded as holding")]
    UnexpectedRelease { node: NodeId },

    #[error("{holders:?} are HELD in the same snapshot")]
    MultipleHolders { holders: Vec<NodeId> },

    #[error("{node} awaits replies while {state}")]
    PendingOutsideWanted { node: NodeId, state: NodeState },

    #[error("{node} lists itself as a reply peer")]
    SelfReference { node: NodeId },

    #[error("{node} has timer {timer} while {state}")]
    TimerMismatch {
        node: NodeId,
        state: NodeState,
        timer: u32,
    },

    #[error("{node} has a request timestamp while RELEASED")]
    StaleTicket { node: NodeId },

    #[error("{node} clock went backwards: {before} -> {after}")]
    ClockRegressed {
        node: NodeId,
        before: Timestamp,
        after: Timestamp,
    },
}

/// Invariant checker fed by a running simulation.
#[derive(Debug, Default)]
pub struct SafetyOracle {
    holder: Option<NodeId>,
    last_clocks: Vec<Timestamp>,
    requested_at: HashMap<NodeId, Duration>,
    entry_log: Vec<(NodeId, Ticket)>,
    violations: Vec<OracleViolation>,
    snapshots_checked: u64,
    max_wait: Duration,
    total_wait: Duration,
}

impl SafetyOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays events in the order the engine recorded them.
    pub fn observe_events(&mut self, events: &[EngineEvent]) {
        for event in events {
            self.observe_event(event);
        }
    }

    fn observe_event(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Reset { node_count } => {
                self.holder = None;
                self.last_clocks = vec![0; *node_count];
                self.requested_at.clear();
                self.entry_log.clear();
            }
            EngineEvent::Requested { node, at, .. } => {
                self.requested_at.insert(*node, *at);
            }
            EngineEvent::Deferred { .. } => {}
            EngineEvent::Entered {
                node,
                ticket,
                at,
                waiting,
            } => {
                if let Some(holder) = self.holder {
                    self.record(OracleViolation::MutualExclusion {
                        holder,
                        intruder: *node,
                        at: *at,
                    });
                }
                self.holder = Some(*node);

                if let Some(older) = waiting.iter().filter(|w| *w < ticket).min() {
                    self.record(OracleViolation::OrderInversion {
                        node: *node,
                        ticket: *ticket,
                        waiting: older.node,
                        older: *older,
                    });
                }

                if let Some(started) = self.requested_at.remove(node) {
                    let wait = at.saturating_sub(started);
                    self.max_wait = self.max_wait.max(wait);
                    self.total_wait += wait;
                }
                self.entry_log.push((*node, *ticket));
            }
            EngineEvent::Released { node, .. } => {
                if self.holder == Some(*node) {
                    self.holder = None;
                } else {
                    self.record(OracleViolation::UnexpectedRelease { node: *node });
                }
            }
        }
    }

    /// Checks per-node invariants on a snapshot.
    pub fn observe_snapshot(&mut self, snapshot: &Snapshot) {
        self.snapshots_checked += 1;

        let holders = snapshot.holders();
        if holders.len() > 1 {
            self.record(OracleViolation::MultipleHolders { holders });
        }

        if self.last_clocks.len() != snapshot.nodes.len() {
            self.last_clocks = vec![0; snapshot.nodes.len()];
        }

        for node in &snapshot.nodes {
            let id = node.id();
            let state = node.state();

            if state != NodeState::Wanted && !node.pending_replies().is_empty() {
                self.record(OracleViolation::PendingOutsideWanted { node: id, state });
            }
            if node.pending_replies().contains(&id) || node.deferred_replies().contains(&id) {
                self.record(OracleViolation::SelfReference { node: id });
            }

            let timer = node.critical_section_timer();
            if (state == NodeState::Held) != (timer > 0) {
                self.record(OracleViolation::TimerMismatch {
                    node: id,
                    state,
                    timer,
                });
            }
            if state == NodeState::Released && node.request_timestamp().is_some() {
                self.record(OracleViolation::StaleTicket { node: id });
            }

            let before = self.last_clocks[id.index()];
            let after = node.clock();
            if after < before {
                self.record(OracleViolation::ClockRegressed {
                    node: id,
                    before,
                    after,
                });
            }
            self.last_clocks[id.index()] = after;
        }
    }

    fn record(&mut self, violation: OracleViolation) {
        warn!(%violation, "invariant violated");
        self.violations.push(violation);
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[OracleViolation] {
        &self.violations
    }

    /// Critical-section entries in the order they happened.
    pub fn entry_log(&self) -> &[(NodeId, Ticket)] {
        &self.entry_log
    }

    pub fn entries(&self) -> usize {
        self.entry_log.len()
    }

    pub fn holder(&self) -> Option<NodeId> {
        self.holder
    }

    /// Nodes that requested and have not entered yet.
    pub fn outstanding_requests(&self) -> usize {
        self.requested_at.len()
    }

    pub fn snapshots_checked(&self) -> u64 {
        self.snapshots_checked
    }

    /// Longest time from request to entry.
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn mean_wait(&self) -> Duration {
        match self.entry_log.len() {
            0 => Duration::ZERO,
            n => self.total_wait / n as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(ts: Timestamp, node: u32) -> Ticket {
        Ticket::new(ts, NodeId(node))
    }

    fn entered(node: u32, ts: Timestamp, waiting: Vec<Ticket>) -> EngineEvent {
        EngineEvent::Entered {
            node: NodeId(node),
            ticket: ticket(ts, node),
            at: Duration::from_secs(ts),
            waiting,
        }
    }

    fn released(node: u32) -> EngineEvent {
        EngineEvent::Released {
            node: NodeId(node),
            flushed: vec![],
            at: Duration::ZERO,
        }
    }

    #[test]
    fn test_clean_handover() {
        let mut oracle = SafetyOracle::new();
        oracle.observe_events(&[
            EngineEvent::Reset { node_count: 2 },
            entered(0, 1, vec![ticket(1, 1)]),
            released(0),
            entered(1, 1, vec![]),
            released(1),
        ]);

        assert!(oracle.is_clean());
        assert_eq!(oracle.entries(), 2);
        assert_eq!(oracle.holder(), None);
    }

    #[test]
    fn test_detects_overlapping_entries() {
        let mut oracle = SafetyOracle::new();
        oracle.observe_events(&[entered(0, 1, vec![]), entered(1, 2, vec![])]);

        assert!(matches!(
            oracle.violations(),
            [OracleViolation::MutualExclusion { holder: NodeId(0), intruder: NodeId(1), .. }]
        ));
    }

    #[test]
    fn test_detects_entry_ahead_of_older_ticket() {
        let mut oracle = SafetyOracle::new();
        oracle.observe_events(&[entered(2, 5, vec![ticket(5, 1), ticket(7, 0)])]);

        assert_eq!(
            oracle.violations(),
            &[OracleViolation::OrderInversion {
                node: NodeId(2),
                ticket: ticket(5, 2),
                waiting: NodeId(1),
                older: ticket(5, 1),
            }]
        );
    }

    #[test]
    fn test_detects_release_without_entry() {
        let mut oracle = SafetyOracle::new();
        oracle.observe_events(&[released(3)]);
        assert_eq!(
            oracle.violations(),
            &[OracleViolation::UnexpectedRelease { node: NodeId(3) }]
        );
    }

    #[test]
    fn test_reset_forgets_holder() {
        let mut oracle = SafetyOracle::new();
        oracle.observe_events(&[
            entered(0, 1, vec![]),
            EngineEvent::Reset { node_count: 3 },
            entered(1, 1, vec![]),
        ]);
        assert!(oracle.is_clean());
        assert_eq!(oracle.entry_log(), &[(NodeId(1), ticket(1, 1))]);
    }

    #[test]
    fn test_wait_is_measured_from_request() {
        let mut oracle = SafetyOracle::new();
        oracle.observe_events(&[
            EngineEvent::Requested {
                node: NodeId(0),
                ticket: ticket(1, 0),
                at: Duration::from_secs(1),
            },
            entered(0, 4, vec![]),
        ]);
        assert_eq!(oracle.max_wait(), Duration::from_secs(3));
        assert_eq!(oracle.mean_wait(), Duration::from_secs(3));
    }
}
