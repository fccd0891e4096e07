//! Write-then-read consistency checks.
//!
//! Writes one tagged record through the authoritative node, waits one grace
//! window, then reads it back from every node of the tier. Usable on a
//! stable cluster as a steady-state replication check.

use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;

use crate::probe::{ProbeError, Prober};
use crate::topology::NodeDescriptor;

/// A node that did not return the written value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub node: String,
    /// Value read back, `None` if the key was absent or the read failed.
    pub observed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub key: String,
    pub value: String,
    pub written_via: String,
    pub checked: usize,
    pub missing: Vec<Divergence>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing_nodes(&self) -> Vec<String> {
        self.missing.iter().map(|d| d.node.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ConsistencyVerifier {
    prober: Prober,
    grace: Duration,
}

impl ConsistencyVerifier {
    pub fn new(prober: Prober, grace: Duration) -> Self {
        Self { prober, grace }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Write `key = value` through `primary`, then read it from each of `nodes`.
    ///
    /// A rejected write is returned as an error; read failures and divergent
    /// values are collected per node and never abort the remaining reads.
    pub async fn write_then_verify(
        &self,
        primary: &NodeDescriptor,
        nodes: &[NodeDescriptor],
        key: &str,
        value: &str,
    ) -> Result<ConsistencyReport, ProbeError> {
        self.prober.write(primary, key, value).await?;
        tracing::debug!(node = %primary.name, key = %key, "Consistency record written");

        tokio::time::sleep(self.grace).await;

        let reads = join_all(nodes.iter().map(|node| self.prober.read(node, key))).await;
        let missing: Vec<Divergence> = nodes
            .iter()
            .zip(reads)
            .filter_map(|(node, read)| match read {
                Ok(Some(observed)) if observed == value => None,
                Ok(observed) => Some(Divergence {
                    node: node.name.clone(),
                    observed,
                    error: None,
                }),
                Err(e) => Some(Divergence {
                    node: node.name.clone(),
                    observed: None,
                    error: Some(e.to_string()),
                }),
            })
            .collect();

        for divergence in &missing {
            tracing::error!(
                node = %divergence.node,
                key = %key,
                observed = ?divergence.observed,
                error = ?divergence.error,
                "Consistency violation"
            );
        }

        Ok(ConsistencyReport {
            key: key.to_string(),
            value: value.to_string(),
            written_via: primary.name.clone(),
            checked: nodes.len(),
            missing,
        })
    }
}
