//! Tier aggregation.
//!
//! # Responsibilities
//! - Probe every node of one tier concurrently
//! - Merge per-node results into a tier-level state
//!
//! # Design Decisions
//! - Isolate and continue: one node failing (or its probe task panicking)
//!   never aborts the rest of the tier
//! - Results keep node iteration order regardless of completion order

use serde::Serialize;

use crate::health::state::HealthState;
use crate::observability::metrics;
use crate::probe::{Prober, ProbeResult};
use crate::topology::{NodeDescriptor, TierKind};

/// Aggregated state of one tier for one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct TierStatus {
    pub tier: TierKind,
    pub overall: HealthState,
    pub nodes: Vec<ProbeResult>,
}

impl TierStatus {
    /// Build a tier status from results given in the same order as `nodes`.
    pub fn evaluate(tier: TierKind, nodes: &[NodeDescriptor], results: Vec<ProbeResult>) -> Self {
        let overall = classify(nodes.iter().map(|n| n.critical).zip(results.iter().map(|r| r.healthy)));
        Self {
            tier,
            overall,
            nodes: results,
        }
    }

    pub fn healthy_count(&self) -> usize {
        self.nodes.iter().filter(|r| r.healthy).count()
    }

    pub fn node(&self, name: &str) -> Option<&ProbeResult> {
        self.nodes.iter().find(|r| r.name == name)
    }
}

/// Severity rule over `(critical, healthy)` pairs.
///
/// Unhealthy if a critical node failed or nothing answered, Degraded if any
/// other node failed, Healthy otherwise.
pub fn classify<I>(nodes: I) -> HealthState
where
    I: IntoIterator<Item = (bool, bool)>,
{
    let mut total = 0;
    let mut failed = 0;
    let mut critical_failed = false;

    for (critical, healthy) in nodes {
        total += 1;
        if !healthy {
            failed += 1;
            critical_failed |= critical;
        }
    }

    if total == 0 || failed == total || critical_failed {
        HealthState::Unhealthy
    } else if failed > 0 {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}

/// Runs probes across one tier.
#[derive(Debug, Clone)]
pub struct TierAggregator {
    prober: Prober,
}

impl TierAggregator {
    pub fn new(prober: Prober) -> Self {
        Self { prober }
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    /// Probe every node of `tier` and classify the result.
    pub async fn aggregate(&self, tier: TierKind, nodes: &[NodeDescriptor]) -> TierStatus {
        let handles: Vec<_> = nodes
            .iter()
            .cloned()
            .map(|node| {
                let prober = self.prober.clone();
                tokio::spawn(async move { prober.probe(&node).await })
            })
            .collect();

        let mut results = Vec::with_capacity(nodes.len());
        for (node, handle) in nodes.iter().zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(node = %node.name, error = %e, "Probe task failed");
                    results.push(ProbeResult::failed(node, format!("probe task failed: {}", e)));
                }
            }
        }

        let status = TierStatus::evaluate(tier, nodes, results);
        for node in nodes.iter().filter(|n| n.critical) {
            if let Some(result) = status.node(&node.name).filter(|r| !r.healthy) {
                tracing::warn!(tier = %tier, node = %node.name, error = ?result.error, "Critical node down");
            }
        }
        tracing::debug!(
            tier = %tier,
            overall = %status.overall,
            healthy = status.healthy_count(),
            total = nodes.len(),
            "Tier aggregated"
        );
        metrics::record_tier_status(tier, status.overall);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_down_is_unhealthy() {
        // coordinator down, two workers up
        let state = classify([(true, false), (false, true), (false, true)]);
        assert_eq!(state, HealthState::Unhealthy);
    }

    #[test]
    fn test_worker_down_is_degraded() {
        let state = classify([(true, true), (false, false), (false, true)]);
        assert_eq!(state, HealthState::Degraded);
    }

    #[test]
    fn test_all_up_is_healthy() {
        assert_eq!(classify([(true, true), (false, true)]), HealthState::Healthy);
    }

    #[test]
    fn test_all_down_without_critical_is_unhealthy() {
        assert_eq!(classify([(false, false), (false, false)]), HealthState::Unhealthy);
    }

    #[test]
    fn test_empty_tier_is_unhealthy() {
        assert_eq!(classify(Vec::<(bool, bool)>::new()), HealthState::Unhealthy);
    }
}
