//! Cluster health and failover verification.
//!
//! Watches a replicated cluster made of a serving tier (primary/replicas), a
//! consensus tier and a routing tier. The monitor answers whether every tier
//! is reachable and within bounds; the failover runner answers whether the
//! cluster re-elects and stays consistent when its leader is removed.

pub mod config;
pub mod topology;

// Probing and health
pub mod health;
pub mod probe;
pub mod report;
pub mod status;

// Leadership and failover
pub mod consensus;
pub mod failover;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::SentinelConfig;
pub use health::{ClusterSnapshot, HealthReporter, SnapshotStore};
pub use lifecycle::{Sentinel, Shutdown};
