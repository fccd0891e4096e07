//! Static cluster topology.
//!
//! # Data Flow
//! ```text
//! [[nodes]] config entries
//!     → Topology::from_config (role parsing, endpoint resolution)
//!     → Topology { serving, consensus, router } (immutable)
//!     → shared via Arc with probes, reporter, verifier, orchestrator
//! ```
//!
//! # Design Decisions
//! - Built once at startup, never mutated
//! - Node order within a tier follows config order; reports preserve it
//! - The configured serving primary is only a starting hint, the live role
//!   is always read from the node itself

pub mod node;

use thiserror::Error;
use url::Url;

use crate::config::NodeConfig;
pub use node::{FaultHandle, NodeDescriptor, Tier, TierKind};

/// Errors building a topology from configuration.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("node '{name}': {reason}")]
    InvalidNode { name: String, reason: String },

    #[error("duplicate node name '{0}'")]
    Duplicate(String),
}

/// Minimum number of members that forms a majority of `members`.
pub fn quorum_size(members: usize) -> usize {
    members / 2 + 1
}

/// All nodes of the cluster, grouped per tier.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    serving: Vec<NodeDescriptor>,
    consensus: Vec<NodeDescriptor>,
    router: Vec<NodeDescriptor>,
}

impl Topology {
    /// Build a topology from node definitions.
    pub fn from_config(nodes: &[NodeConfig]) -> Result<Self, TopologyError> {
        let mut topology = Topology::default();

        for config in nodes {
            if topology.node(&config.name).is_some() {
                return Err(TopologyError::Duplicate(config.name.clone()));
            }
            let descriptor = describe(config)?;
            match descriptor.kind() {
                TierKind::Serving => topology.serving.push(descriptor),
                TierKind::Consensus => topology.consensus.push(descriptor),
                TierKind::Router => topology.router.push(descriptor),
            }
        }

        tracing::debug!(
            serving = topology.serving.len(),
            consensus = topology.consensus.len(),
            router = topology.router.len(),
            "Topology loaded"
        );
        Ok(topology)
    }

    /// Nodes of one tier in configuration order.
    pub fn tier(&self, kind: TierKind) -> &[NodeDescriptor] {
        match kind {
            TierKind::Serving => &self.serving,
            TierKind::Consensus => &self.consensus,
            TierKind::Router => &self.router,
        }
    }

    /// Tiers that have at least one node.
    pub fn tiers(&self) -> impl Iterator<Item = TierKind> + '_ {
        TierKind::ALL.into_iter().filter(|kind| !self.tier(*kind).is_empty())
    }

    pub fn node(&self, name: &str) -> Option<&NodeDescriptor> {
        self.all().find(|n| n.name == name)
    }

    pub fn all(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.serving.iter().chain(self.consensus.iter()).chain(self.router.iter())
    }

    /// The node configured as serving primary, if any.
    pub fn configured_primary(&self) -> Option<&NodeDescriptor> {
        self.serving.iter().find(|n| n.tier == Tier::ServingPrimary)
    }
}

fn describe(config: &NodeConfig) -> Result<NodeDescriptor, TopologyError> {
    let invalid = |reason: String| TopologyError::InvalidNode {
        name: config.name.clone(),
        reason,
    };

    let tier: Tier = config.role.parse().map_err(invalid)?;
    let api_port = config.api_port.unwrap_or(config.port);
    let api_base = Url::parse(&format!("http://{}:{}/", config.host, api_port))
        .map_err(|e| invalid(format!("invalid endpoint: {}", e)))?;
    let stats_url = match &config.stats_url {
        Some(raw) => Some(Url::parse(raw).map_err(|e| invalid(format!("invalid stats_url: {}", e)))?),
        None => None,
    };

    Ok(NodeDescriptor {
        name: config.name.clone(),
        tier,
        host: config.host.clone(),
        port: config.port,
        api_base,
        fault_handle: FaultHandle(config.fault_handle.clone().unwrap_or_else(|| config.name.clone())),
        critical: config.critical.unwrap_or(tier == Tier::ServingPrimary),
        stats_url,
    })
}
