//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Reporter loop (reporter.rs):
//!     Fixed cadence
//!     → aggregator.rs per tier (parallel probes, isolate-and-continue)
//!     → snapshot.rs ClusterSnapshot (overall = most severe tier)
//!     → report sink (one JSON line) + SnapshotStore (atomic swap)
//!
//! Readers:
//!     readiness = serving and router tiers Healthy in the last snapshot
//!     liveness  = reporter loop executing
//! ```
//!
//! # Design Decisions
//! - A cycle failure is logged and the loop continues; the monitor must
//!   outlive the cluster it watches
//! - Snapshots are immutable values; the store is the only shared mutable state
//! - Sleep is interval minus cycle time, never negative

pub mod aggregator;
pub mod reporter;
pub mod snapshot;
pub mod state;

pub use aggregator::{classify, TierAggregator, TierStatus};
pub use reporter::{CycleReport, HealthReporter};
pub use snapshot::{ClusterSnapshot, SnapshotStore};
pub use state::HealthState;
