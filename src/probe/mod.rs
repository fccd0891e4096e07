//! Node probing subsystem.
//!
//! # Data Flow
//! ```text
//! Prober::probe(node)
//!     → transport.rs (NodeTransport: liveness, status, self-status)
//!     → resilience::timeouts (every call bounded by probe_timeout)
//!     → ProbeResult { healthy, metrics, error } (fresh per call)
//! ```
//!
//! # Design Decisions
//! - `probe` never fails outward: timeouts, refused connections and malformed
//!   answers become `healthy = false` with the reason in `error`
//! - Probes are idempotent and safe to retry on the next cycle
//! - Serving replicas beyond the lag threshold are unhealthy even if reachable

pub mod http;
pub mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;
use crate::topology::{NodeDescriptor, Tier, TierKind};

pub use http::HttpTransport;
pub use transport::{ConsensusSelf, NodeTransport, ServingStatus};

/// Transient failure talking to a node. Recorded, retried next cycle.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// A single reported metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            MetricValue::Number(_) => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Number(v as f64)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Number(if v { 1.0 } else { 0.0 })
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

pub type Metrics = BTreeMap<String, MetricValue>;

/// Outcome of one probe against one node.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub name: String,
    #[serde(skip)]
    pub tier: Tier,
    #[serde(skip)]
    pub timestamp: DateTime<Utc>,
    pub healthy: bool,
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    /// A failed result with no metrics.
    pub fn failed(node: &NodeDescriptor, error: impl Into<String>) -> Self {
        Self {
            name: node.name.clone(),
            tier: node.tier,
            timestamp: Utc::now(),
            healthy: false,
            metrics: Metrics::new(),
            error: Some(error.into()),
        }
    }

    pub fn metric(&self, key: &str) -> Option<&MetricValue> {
        self.metrics.get(key)
    }

    /// Serving node currently reporting the primary role.
    pub fn reports_primary(&self) -> bool {
        self.healthy && self.metric("role").and_then(MetricValue::as_str) == Some("primary")
    }

    /// Consensus node currently reporting itself as leader.
    pub fn reports_leader(&self) -> bool {
        self.healthy && self.metric("is_leader").and_then(MetricValue::as_f64) == Some(1.0)
    }
}

/// Runs bounded probes through a transport.
#[derive(Clone)]
pub struct Prober {
    transport: Arc<dyn NodeTransport>,
    timeout: Duration,
    lag_threshold_secs: f64,
}

impl Prober {
    pub fn new(transport: Arc<dyn NodeTransport>, timeout: Duration, lag_threshold_secs: f64) -> Self {
        Self {
            transport,
            timeout,
            lag_threshold_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe one node. Never fails; failure is encoded in the result.
    pub async fn probe(&self, node: &NodeDescriptor) -> ProbeResult {
        let started = Instant::now();
        let mut metrics = Metrics::new();

        let outcome = match node.kind() {
            TierKind::Serving => self.probe_serving(node, &mut metrics).await,
            TierKind::Consensus => self.probe_consensus(node, &mut metrics).await,
            TierKind::Router => self.probe_router(node, &mut metrics).await,
        };

        let elapsed = started.elapsed();
        metrics.insert("probe_ms".into(), (elapsed.as_secs_f64() * 1000.0).into());

        let result = ProbeResult {
            name: node.name.clone(),
            tier: node.tier,
            timestamp: Utc::now(),
            healthy: outcome.is_ok(),
            metrics,
            error: outcome.err().map(|e| e.to_string()),
        };

        if let Some(error) = &result.error {
            tracing::warn!(node = %node.name, tier = %node.kind(), error = %error, "Probe failed");
        }
        metrics::record_probe(node.kind(), &result, elapsed);
        result
    }

    async fn probe_serving(&self, node: &NodeDescriptor, metrics: &mut Metrics) -> Result<(), ProbeError> {
        self.liveness(node).await?;
        let status = self.serving_status(node).await?;

        let role = if status.is_primary() { "primary" } else { "replica" };
        metrics.insert("role".into(), role.into());
        metrics.insert("in_recovery".into(), status.in_recovery.into());
        for (state, count) in &status.connections {
            metrics.insert(format!("connections_{}", state.replace(' ', "_")), (*count).into());
        }
        metrics.insert("connections_total".into(), status.total_connections().into());
        if let Some(ratio) = status.cache_hit_ratio {
            metrics.insert("cache_hit_ratio".into(), ratio.into());
        }

        if status.in_recovery {
            if let Some(delay) = status.replication_delay_secs {
                metrics.insert("replication_delay_secs".into(), delay.into());
                if delay > self.lag_threshold_secs {
                    return Err(ProbeError::OutOfBounds(format!(
                        "replication delay {:.1}s exceeds {:.1}s",
                        delay, self.lag_threshold_secs
                    )));
                }
            }
        }
        Ok(())
    }

    async fn probe_consensus(&self, node: &NodeDescriptor, metrics: &mut Metrics) -> Result<(), ProbeError> {
        self.liveness(node).await?;
        let status = self.consensus_self(node).await?;

        metrics.insert("state".into(), status.state.clone().into());
        metrics.insert("is_leader".into(), status.is_leader.into());
        metrics.insert("member_id".into(), status.member_id.clone().into());
        if let Some(leader) = &status.leader_id {
            metrics.insert("leader_id".into(), leader.clone().into());
        }
        Ok(())
    }

    async fn probe_router(&self, node: &NodeDescriptor, metrics: &mut Metrics) -> Result<(), ProbeError> {
        let started = Instant::now();
        self.liveness(node).await?;
        metrics.insert("connect_ms".into(), (started.elapsed().as_secs_f64() * 1000.0).into());

        if node.stats_url.is_some() {
            let available = self.bounded(self.transport.router_stats(node)).await.is_ok();
            metrics.insert("stats_available".into(), available.into());
        }
        Ok(())
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ProbeError>
    where
        F: std::future::Future<Output = Result<T, ProbeError>>,
    {
        with_timeout(self.timeout, fut).await
    }

    pub async fn liveness(&self, node: &NodeDescriptor) -> Result<(), ProbeError> {
        self.bounded(self.transport.liveness(node)).await
    }

    pub async fn serving_status(&self, node: &NodeDescriptor) -> Result<ServingStatus, ProbeError> {
        self.bounded(self.transport.serving_status(node)).await
    }

    pub async fn consensus_self(&self, node: &NodeDescriptor) -> Result<ConsensusSelf, ProbeError> {
        self.bounded(self.transport.consensus_self(node)).await
    }

    pub async fn write(&self, node: &NodeDescriptor, key: &str, value: &str) -> Result<(), ProbeError> {
        self.bounded(self.transport.write(node, key, value)).await
    }

    pub async fn read(&self, node: &NodeDescriptor, key: &str) -> Result<Option<String>, ProbeError> {
        self.bounded(self.transport.read(node, key)).await
    }
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("timeout", &self.timeout)
            .field("lag_threshold_secs", &self.lag_threshold_secs)
            .finish()
    }
}
