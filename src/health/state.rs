//! Tier and cluster health states.
//!
//! # States
//! - Healthy: every node answered within bounds
//! - Degraded: a non-critical node failed
//! - Unhealthy: a critical node failed, or no node answered
//!
//! # Design Decisions
//! - States are totally ordered by severity so a cluster's overall state is
//!   simply the maximum of its tiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Health severity, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthState {
    /// Numeric severity for gauges: 0 healthy, 1 degraded, 2 unhealthy.
    pub fn severity(self) -> u8 {
        match self {
            HealthState::Healthy => 0,
            HealthState::Degraded => 1,
            HealthState::Unhealthy => 2,
        }
    }

    /// The most severe state of `states`; `Healthy` when empty.
    pub fn worst<I: IntoIterator<Item = HealthState>>(states: I) -> HealthState {
        states.into_iter().max().unwrap_or(HealthState::Healthy)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        })
    }
}
