//! Continuous cluster health reporting.
//!
//! # Responsibilities
//! - Periodically aggregate every tier into a `ClusterSnapshot`
//! - Hand each snapshot to the report sink and publish it for readers
//! - Flag tiers where more than one node claims authority

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time;

use crate::health::aggregator::{TierAggregator, TierStatus};
use crate::health::snapshot::{ClusterSnapshot, SnapshotStore};
use crate::observability::metrics;
use crate::probe::{MetricValue, Prober};
use crate::report::{SinkError, SnapshotSink};
use crate::topology::{TierKind, Topology};

/// Result of one reporter cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub snapshot: Arc<ClusterSnapshot>,
    /// Set when the report sink rejected the snapshot.
    pub sink_error: Option<SinkError>,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.sink_error.is_none()
    }
}

pub struct HealthReporter {
    topology: Arc<Topology>,
    aggregator: TierAggregator,
    store: Arc<SnapshotStore>,
    sink: Option<Arc<dyn SnapshotSink>>,
    interval: Duration,
}

impl HealthReporter {
    pub fn new(topology: Arc<Topology>, prober: Prober, store: Arc<SnapshotStore>, interval: Duration) -> Self {
        Self {
            topology,
            aggregator: TierAggregator::new(prober),
            store,
            sink: None,
            interval,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Loop until shutdown. Shutdown is only observed between cycles so a
    /// snapshot is never cut short.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            tiers = self.topology.tiers().count(),
            "Health reporter starting"
        );

        let store = self.store.clone();
        let interval = self.interval;
        let reporter = Arc::new(self);
        store.set_running(true);

        loop {
            let started = Instant::now();

            let cycle = {
                let reporter = reporter.clone();
                tokio::spawn(async move { reporter.cycle().await })
            };
            match cycle.await {
                Ok(report) => {
                    let succeeded = report.succeeded();
                    metrics::record_cycle(started.elapsed(), succeeded);
                    if !succeeded {
                        store.record_failure();
                    }
                    tracing::debug!(
                        overall = %report.snapshot.overall_status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        succeeded = succeeded,
                        "Health cycle complete"
                    );
                }
                Err(e) => {
                    metrics::record_cycle(started.elapsed(), false);
                    store.record_failure();
                    tracing::error!(error = %e, "Health cycle failed, continuing with next cycle");
                }
            }

            let wait = interval.saturating_sub(started.elapsed());
            tokio::select! {
                _ = time::sleep(wait) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Health reporter received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        store.set_running(false);
    }

    /// One full cycle: aggregate, publish, report.
    ///
    /// Readers see the snapshot even when the report sink fails.
    pub async fn cycle(&self) -> CycleReport {
        let snapshot = Arc::new(self.snapshot().await);
        self.store.publish(snapshot.clone());

        let sink_error = match &self.sink {
            Some(sink) => sink.publish(&snapshot).err(),
            None => None,
        };
        if let Some(e) = &sink_error {
            tracing::error!(error = %e, "Failed to write health report");
        }
        CycleReport { snapshot, sink_error }
    }

    /// Aggregate all configured tiers concurrently into one snapshot.
    pub async fn snapshot(&self) -> ClusterSnapshot {
        let topology = &self.topology;
        let tiers = join_all(
            topology
                .tiers()
                .map(|kind| self.aggregator.aggregate(kind, topology.tier(kind))),
        )
        .await;

        let snapshot = ClusterSnapshot::new(Utc::now(), tiers);
        for tier in &snapshot.tiers {
            observe_authority(tier);
        }
        if let (Some(configured), Some(serving)) = (topology.configured_primary(), snapshot.tier(TierKind::Serving)) {
            let acting: Vec<&str> =
                serving.nodes.iter().filter(|r| r.reports_primary()).map(|r| r.name.as_str()).collect();
            if let [acting] = acting.as_slice() {
                if *acting != configured.name {
                    tracing::info!(configured = %configured.name, acting = %acting, "Serving primary has moved");
                }
            }
        }
        metrics::record_cluster_status(snapshot.overall_status);
        snapshot
    }
}

/// Log and count tiers where more than one node claims the writer role.
fn observe_authority(tier: &TierStatus) {
    let claimants: Vec<&str> = match tier.tier {
        TierKind::Serving => tier.nodes.iter().filter(|r| r.reports_primary()).map(|r| r.name.as_str()).collect(),
        TierKind::Consensus => {
            let beliefs: std::collections::BTreeSet<&str> = tier
                .nodes
                .iter()
                .filter_map(|r| r.metric("leader_id").and_then(MetricValue::as_str))
                .collect();
            metrics::record_leader_views(beliefs.len());
            tier.nodes.iter().filter(|r| r.reports_leader()).map(|r| r.name.as_str()).collect()
        }
        TierKind::Router => return,
    };

    if claimants.len() > 1 {
        tracing::error!(tier = %tier.tier, nodes = ?claimants, "Multiple nodes claim authority");
        metrics::record_split_brain(tier.tier);
    }
}
