//! Scenarios exercising the Ricart-Agrawala engine under different loads.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// RA-001: Default load, occasional requests
    Steady,

    /// RA-002: Most idle nodes request every tick
    Contention,

    /// RA-003: Every node requests at once with equal timestamps
    TieBreak,

    /// RA-004: Heavy latency jitter plus one slow node
    Jitter,

    /// RA-005: One node requests alone under manual control
    Solo,

    /// RA-006: Large cluster, constant demand, no reply delay
    Stress,
}

impl ScenarioId {
    /// Returns all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Steady,
            ScenarioId::Contention,
            ScenarioId::TieBreak,
            ScenarioId::Jitter,
            ScenarioId::Solo,
            ScenarioId::Stress,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Steady => "steady",
            ScenarioId::Contention => "contention",
            ScenarioId::TieBreak => "tie_break",
            ScenarioId::Jitter => "jitter",
            ScenarioId::Solo => "solo",
            ScenarioId::Stress => "stress",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Steady => "Default request rate; safety and eventual quiescence",
            ScenarioId::Contention => "60% request rate; many overlapping requests",
            ScenarioId::TieBreak => "Simultaneous requests at timestamp 1; entries in id order",
            ScenarioId::Jitter => "Normal latency with wide spread and a slowed node",
            ScenarioId::Solo => "Lone requester needs exactly N-1 replies",
            ScenarioId::Stress => "At least 12 nodes at 50% request rate",
        }
    }

    /// Whether the driver issues requests on its own.
    pub fn auto_requests(&self) -> bool {
        !matches!(self, ScenarioId::TieBreak | ScenarioId::Solo)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady" | "ra-001" => Ok(ScenarioId::Steady),
            "contention" | "ra-002" => Ok(ScenarioId::Contention),
            "tie_break" | "tiebreak" | "ra-003" => Ok(ScenarioId::TieBreak),
            "jitter" | "ra-004" => Ok(ScenarioId::Jitter),
            "solo" | "manual" | "ra-005" => Ok(ScenarioId::Solo),
            "stress" | "ra-006" => Ok(ScenarioId::Stress),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
