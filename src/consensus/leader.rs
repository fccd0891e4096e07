//! Leader discovery and the single-leader invariant.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;

use crate::consensus::quorum::QuorumDecision;
use crate::observability::metrics;
use crate::probe::Prober;
use crate::topology::{NodeDescriptor, TierKind};

/// More than one node reported leader state in the same sampling pass.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("split brain detected: {nodes:?} all report leader state")]
pub struct SplitBrainDetected {
    pub nodes: Vec<String>,
}

/// One node's answer in a sampling pass.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderView {
    pub node: String,
    pub timestamp: DateTime<Utc>,
    pub reachable: bool,
    pub is_leader: bool,
    pub member_id: Option<String>,
    /// Leader identity this node believes in.
    pub believed_leader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// All views gathered in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderSample {
    pub taken_at: DateTime<Utc>,
    pub views: Vec<LeaderView>,
}

impl LeaderSample {
    /// Names of nodes that report themselves as leader.
    pub fn self_reported_leaders(&self) -> Vec<String> {
        self.views
            .iter()
            .filter(|v| v.reachable && v.is_leader)
            .map(|v| v.node.clone())
            .collect()
    }

    /// Distinct leader identities believed by reachable nodes.
    pub fn agreement(&self) -> BTreeSet<String> {
        self.views
            .iter()
            .filter(|v| v.reachable)
            .filter_map(|v| v.believed_leader.clone())
            .collect()
    }

    pub fn reachable(&self) -> usize {
        self.views.iter().filter(|v| v.reachable).count()
    }

    /// The single self-reported leader among `nodes`, if any.
    pub fn leader<'a>(&self, nodes: &'a [NodeDescriptor]) -> Result<Option<&'a NodeDescriptor>, SplitBrainDetected> {
        let leaders = self.self_reported_leaders();
        match leaders.len() {
            0 => Ok(None),
            1 => Ok(nodes.iter().find(|n| n.name == leaders[0])),
            _ => Err(SplitBrainDetected { nodes: leaders }),
        }
    }
}

/// Inspects the consensus tier.
#[derive(Debug, Clone)]
pub struct LeaderVerifier {
    prober: Prober,
}

impl LeaderVerifier {
    pub fn new(prober: Prober) -> Self {
        Self { prober }
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    /// Query every node's self-status in one concurrent pass.
    pub async fn sample(&self, nodes: &[NodeDescriptor]) -> LeaderSample {
        let taken_at = Utc::now();
        let views = join_all(nodes.iter().map(|node| async move {
            match self.prober.consensus_self(node).await {
                Ok(status) => LeaderView {
                    node: node.name.clone(),
                    timestamp: Utc::now(),
                    reachable: true,
                    is_leader: status.is_leader,
                    member_id: Some(status.member_id),
                    believed_leader: status.leader_id,
                    error: None,
                },
                Err(e) => LeaderView {
                    node: node.name.clone(),
                    timestamp: Utc::now(),
                    reachable: false,
                    is_leader: false,
                    member_id: None,
                    believed_leader: None,
                    error: Some(e.to_string()),
                },
            }
        }))
        .await;

        LeaderSample { taken_at, views }
    }

    /// The node reporting leader state, `None` if no node does.
    pub async fn find_leader(&self, nodes: &[NodeDescriptor]) -> Result<Option<NodeDescriptor>, SplitBrainDetected> {
        let sample = self.sample(nodes).await;
        tracing::debug!(reachable = sample.reachable(), total = nodes.len(), "Consensus tier sampled");
        match sample.leader(nodes) {
            Ok(leader) => Ok(leader.cloned()),
            Err(split) => {
                tracing::error!(nodes = ?split.nodes, "Split brain detected in consensus tier");
                metrics::record_split_brain(TierKind::Consensus);
                Err(split)
            }
        }
    }

    /// Leader identities believed across the tier.
    pub async fn leader_agreement(&self, nodes: &[NodeDescriptor]) -> BTreeSet<String> {
        let agreement = self.sample(nodes).await.agreement();
        metrics::record_leader_views(agreement.len());
        if agreement.len() > 1 {
            tracing::warn!(leaders = ?agreement, "Consensus nodes disagree on leader identity");
        }
        agreement
    }

    /// Write through one reachable node and report whether it was accepted.
    pub async fn quorum_write_probe(&self, nodes: &[NodeDescriptor], key: &str, value: &str) -> QuorumDecision {
        let reachability = join_all(nodes.iter().map(|node| self.prober.liveness(node))).await;
        let reachable: Vec<&NodeDescriptor> = nodes
            .iter()
            .zip(reachability)
            .filter(|(_, live)| live.is_ok())
            .map(|(node, _)| node)
            .collect();

        let Some(target) = reachable.first() else {
            return QuorumDecision {
                accepted: false,
                node: None,
                reachable: 0,
                total: nodes.len(),
                error: Some("no reachable consensus node".into()),
            };
        };

        let outcome = self.prober.write(target, key, value).await;
        let decision = QuorumDecision {
            accepted: outcome.is_ok(),
            node: Some(target.name.clone()),
            reachable: reachable.len(),
            total: nodes.len(),
            error: outcome.err().map(|e| e.to_string()),
        };
        tracing::info!(
            node = %target.name,
            accepted = decision.accepted,
            reachable = decision.reachable,
            total = decision.total,
            "Quorum write probe"
        );
        decision
    }
}
