//! Common types shared by the engine and the simulation harness.

use serde::{Deserialize, Serialize};

/// Identifier of a participating node.
///
/// Nodes are numbered densely from zero and keep their ordinal for the
/// lifetime of a simulation, so the id doubles as an index into the node
/// arena and as the tie-breaker in request ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Creates a NodeId from an arena index.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Returns the arena index for this node.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_index_roundtrip() {
        let id = NodeId::from_index(7);
        assert_eq!(id, NodeId(7));
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn test_node_id_ordering_follows_ordinal() {
        assert!(NodeId(1) < NodeId(2));
        assert_eq!(NodeId(3).to_string(), "N3");
    }
}
