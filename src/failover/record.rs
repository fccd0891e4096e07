//! Failover trial records.
//!
//! Every trial yields a record, pass or fail. Records are finalized once and
//! appended to the report log by the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::TrialTarget;
use crate::consensus::QuorumDecision;
use crate::failover::consistency::ConsistencyReport;

/// Trial state machine.
///
/// `Stable → FaultInjected → AwaitingPromotion → Promoted | TimedOut →
/// ConsistencyChecked → Restored`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialPhase {
    Stable,
    FaultInjected,
    AwaitingPromotion,
    Promoted,
    TimedOut,
    ConsistencyChecked,
    Restored,
}

/// Why promotion did not happen in bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutCause {
    /// Fewer than a majority of consensus members were reachable.
    NoQuorum,
    /// Quorum was present but nothing was promoted.
    NoPromotion,
}

/// Trial-level failure tag.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    #[error("no leader or primary found before fault injection")]
    NoLeader,

    #[error("split brain: {nodes:?}")]
    SplitBrain { nodes: Vec<String> },

    #[error("fault injection failed: {reason}")]
    InjectionFailed { reason: String },

    #[error("failover timed out ({cause:?})")]
    FailoverTimeout { cause: TimeoutCause },

    #[error("write through new leader rejected: {reason}")]
    WriteRejected { reason: String },

    #[error("consistency violation on {nodes:?}")]
    ConsistencyViolation { nodes: Vec<String> },

    #[error("restored node did not rejoin: {reason}")]
    RejoinFailed { reason: String },

    #[error("restored node resumed as leader")]
    ResumedAsLeader,

    #[error("quorum lost (intentional: {intentional})")]
    QuorumLost { intentional: bool },
}

/// Outcome of restarting the removed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    pub node: String,
    pub rejoined: bool,
    /// The node reported the leader/primary role after rejoining.
    pub authoritative: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One orchestrated leader/primary failover.
#[derive(Debug, Clone, Serialize)]
pub struct FailoverRecord {
    pub trial_id: Uuid,
    pub kind: TrialTarget,
    /// Node removed by the trial.
    pub target: Option<String>,
    pub phase: TrialPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub detected_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
    pub new_leader: Option<String>,
    pub consistency: Option<ConsistencyReport>,
    pub restore: Option<RestoreOutcome>,
    pub failures: Vec<FailureKind>,
    pub finished_at: DateTime<Utc>,
}

impl FailoverRecord {
    pub fn new(kind: TrialTarget) -> Self {
        Self {
            trial_id: Uuid::new_v4(),
            kind,
            target: None,
            phase: TrialPhase::Stable,
            started_at: None,
            detected_at: None,
            elapsed_ms: None,
            new_leader: None,
            consistency: None,
            restore: None,
            failures: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn timeout_cause(&self) -> Option<TimeoutCause> {
        self.failures.iter().find_map(|f| match f {
            FailureKind::FailoverTimeout { cause } => Some(*cause),
            _ => None,
        })
    }
}

/// A deliberate multi-node removal from the consensus tier.
#[derive(Debug, Clone, Serialize)]
pub struct QuorumTrialRecord {
    pub trial_id: Uuid,
    pub stopped: Vec<String>,
    /// The stopped set left fewer than a majority of members.
    pub majority_removed: bool,
    pub decision: Option<QuorumDecision>,
    pub restored: Vec<RestoreOutcome>,
    pub failures: Vec<FailureKind>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl QuorumTrialRecord {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Aggregate of a sequential trial run.
#[derive(Debug, Clone, Serialize)]
pub struct TrialSummary {
    pub kind: TrialTarget,
    pub trials: usize,
    pub passed: usize,
    pub failed: usize,
    pub max_elapsed_ms: Option<u64>,
    pub mean_elapsed_ms: Option<f64>,
    pub records: Vec<FailoverRecord>,
}

impl TrialSummary {
    pub fn from_records(kind: TrialTarget, records: Vec<FailoverRecord>) -> Self {
        let passed = records.iter().filter(|r| r.passed()).count();
        let elapsed: Vec<u64> = records.iter().filter_map(|r| r.elapsed_ms).collect();
        let mean_elapsed_ms = if elapsed.is_empty() {
            None
        } else {
            Some(elapsed.iter().sum::<u64>() as f64 / elapsed.len() as f64)
        };

        Self {
            kind,
            trials: records.len(),
            passed,
            failed: records.len() - passed,
            max_elapsed_ms: elapsed.iter().copied().max(),
            mean_elapsed_ms,
            records,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
