//! The seam between probes and the external tiers.
//!
//! # Responsibilities
//! - Name every call the sentinel makes against a node
//! - Decode each tier's answers into typed status values
//!
//! # Design Decisions
//! - One trait for all tiers so the verifier and orchestrator can run against
//!   an in-memory cluster in tests and real nodes in production
//! - Implementations do not enforce deadlines; `Prober` wraps every call

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::probe::ProbeError;
use crate::topology::NodeDescriptor;

/// Status fields reported by a serving-tier node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServingStatus {
    /// True on replicas (node is replaying from a primary).
    pub in_recovery: bool,
    /// Session count per connection state.
    pub connections: BTreeMap<String, u64>,
    /// Seconds behind the primary; only meaningful on replicas.
    pub replication_delay_secs: Option<f64>,
    /// Buffer cache hit ratio in `[0, 1]`.
    pub cache_hit_ratio: Option<f64>,
}

impl ServingStatus {
    pub fn is_primary(&self) -> bool {
        !self.in_recovery
    }

    pub fn total_connections(&self) -> u64 {
        self.connections.values().sum()
    }
}

/// A consensus node's view of itself and of the current leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusSelf {
    pub name: String,
    pub member_id: String,
    /// Raw state string as reported (e.g. `StateLeader`).
    pub state: String,
    /// "Am I the leader?"
    pub is_leader: bool,
    /// "Who do I think the leader is?"
    pub leader_id: Option<String>,
}

/// Calls the sentinel issues against nodes.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Trivial liveness check. Routers are checked by passing through a connection.
    async fn liveness(&self, node: &NodeDescriptor) -> Result<(), ProbeError>;

    /// Serving-tier status fields.
    async fn serving_status(&self, node: &NodeDescriptor) -> Result<ServingStatus, ProbeError>;

    /// Consensus-tier self status.
    async fn consensus_self(&self, node: &NodeDescriptor) -> Result<ConsensusSelf, ProbeError>;

    /// Router statistics page. `Unsupported` when the node has none configured.
    async fn router_stats(&self, node: &NodeDescriptor) -> Result<(), ProbeError>;

    /// Write `key = value` through `node`.
    async fn write(&self, node: &NodeDescriptor, key: &str, value: &str) -> Result<(), ProbeError>;

    /// Read `key` from `node`; `None` when absent.
    async fn read(&self, node: &NodeDescriptor, key: &str) -> Result<Option<String>, ProbeError>;
}
