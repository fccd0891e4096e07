//! Observed quorum decisions.

use serde::Serialize;

use crate::topology::quorum_size;

/// Outcome of one write attempted through the consensus tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuorumDecision {
    pub accepted: bool,
    /// Node the write was issued through; `None` when nothing was reachable.
    pub node: Option<String>,
    pub reachable: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QuorumDecision {
    /// Whether a majority of members answered liveness at probe time.
    pub fn had_majority(&self) -> bool {
        self.total > 0 && self.reachable >= quorum_size(self.total)
    }

    /// Accepted without a majority, or rejected with one.
    pub fn contradicts_majority(&self) -> bool {
        self.accepted != self.had_majority()
    }
}
