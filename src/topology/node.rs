//! Node identity and tier membership.
//!
//! # Responsibilities
//! - Represent a single cluster node and the tier it serves
//! - Carry the endpoints probes talk to
//! - Carry the opaque handle the fault injector acts on

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Role a node is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    ServingPrimary,
    ServingReplica,
    Consensus,
    Router,
}

impl Tier {
    /// The homogeneous group this role belongs to.
    pub fn kind(self) -> TierKind {
        match self {
            Tier::ServingPrimary | Tier::ServingReplica => TierKind::Serving,
            Tier::Consensus => TierKind::Consensus,
            Tier::Router => TierKind::Router,
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serving-primary" => Ok(Tier::ServingPrimary),
            "serving-replica" => Ok(Tier::ServingReplica),
            "consensus" => Ok(Tier::Consensus),
            "router" => Ok(Tier::Router),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Tier grouping used for aggregation and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Serving,
    Consensus,
    Router,
}

impl TierKind {
    pub const ALL: [TierKind; 3] = [TierKind::Serving, TierKind::Consensus, TierKind::Router];

    pub fn as_str(self) -> &'static str {
        match self {
            TierKind::Serving => "serving",
            TierKind::Consensus => "consensus",
            TierKind::Router => "router",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier understood by the fault injector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaultHandle(pub String);

impl fmt::Display for FaultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single node. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub name: String,
    pub tier: Tier,
    pub host: String,
    pub port: u16,
    /// Base URL of the node's HTTP status/API surface.
    pub api_base: Url,
    pub fault_handle: FaultHandle,
    /// Failure of this node makes its whole tier unhealthy.
    pub critical: bool,
    pub stats_url: Option<Url>,
}

impl NodeDescriptor {
    pub fn kind(&self) -> TierKind {
        self.tier.kind()
    }

    /// `host:port` of the node's service port.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve a path against the node's API base.
    pub fn api_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.api_base.join(path)
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address())
    }
}
