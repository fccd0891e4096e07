//! Cluster snapshots and the last-known health.
//!
//! # Responsibilities
//! - Compose tier statuses into one immutable `ClusterSnapshot` per cycle
//! - Hold the last snapshot for readiness/liveness readers
//!
//! # Design Decisions
//! - The reporter is the single writer; readers load an `Arc` without locking
//! - Readiness = serving and router tiers Healthy; a tier absent from the
//!   topology does not block readiness
//! - Liveness = the reporter loop is executing, independent of any snapshot

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::health::aggregator::TierStatus;
use crate::health::state::HealthState;
use crate::topology::TierKind;

/// Tiers that must be Healthy for the cluster to be ready.
const READINESS_TIERS: [TierKind; 2] = [TierKind::Serving, TierKind::Router];

/// One cycle's view of the cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSnapshot {
    pub timestamp: DateTime<Utc>,
    pub overall_status: HealthState,
    pub tiers: Vec<TierStatus>,
}

impl ClusterSnapshot {
    pub fn new(timestamp: DateTime<Utc>, tiers: Vec<TierStatus>) -> Self {
        let overall_status = HealthState::worst(tiers.iter().map(|t| t.overall));
        Self {
            timestamp,
            overall_status,
            tiers,
        }
    }

    pub fn tier(&self, kind: TierKind) -> Option<&TierStatus> {
        self.tiers.iter().find(|t| t.tier == kind)
    }

    pub fn is_ready(&self) -> bool {
        READINESS_TIERS
            .iter()
            .all(|kind| self.tier(*kind).map_or(true, |t| t.overall == HealthState::Healthy))
    }
}

/// Process-wide last-known health.
pub struct SnapshotStore {
    latest: ArcSwapOption<ClusterSnapshot>,
    running: AtomicBool,
    cycles: AtomicU64,
    failed_cycles: AtomicU64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            latest: ArcSwapOption::empty(),
            running: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            failed_cycles: AtomicU64::new(0),
        }
    }

    /// Replace the last snapshot.
    pub fn publish(&self, snapshot: Arc<ClusterSnapshot>) {
        self.latest.store(Some(snapshot));
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn latest(&self) -> Option<Arc<ClusterSnapshot>> {
        self.latest.load_full()
    }

    /// False until the first snapshot lands.
    pub fn readiness(&self) -> bool {
        self.latest().map_or(false, |s| s.is_ready())
    }

    pub fn liveness(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Number of snapshots published so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn record_failure(&self) {
        self.failed_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Cycles that panicked or could not write their report.
    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles.load(Ordering::Relaxed)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("running", &self.liveness())
            .field("cycles", &self.cycles())
            .field("failed_cycles", &self.failed_cycles())
            .finish()
    }
}
