//! Failover verification subsystem.
//!
//! # Data Flow
//! ```text
//! FailoverOrchestrator::run_trial(target)
//!     Stable             → current leader/primary (consensus::LeaderVerifier or serving role)
//!     FaultInjected      → injector.rs stop(node), start timestamp
//!     AwaitingPromotion  → poll every poll_interval until deadline
//!     Promoted|TimedOut  → elapsed, or timeout cause (no_quorum | no_promotion)
//!     ConsistencyChecked → consistency.rs write_then_verify through new leader
//!     Restored           → injector.rs start(node), rejoin as follower
//!     → record.rs FailoverRecord
//! ```

pub mod consistency;
pub mod injector;
pub mod orchestrator;
pub mod record;

pub use consistency::{ConsistencyReport, ConsistencyVerifier, Divergence};
pub use injector::{CommandFaultInjector, FaultError, FaultInjector};
pub use orchestrator::FailoverOrchestrator;
pub use record::{
    FailoverRecord, FailureKind, QuorumTrialRecord, RestoreOutcome, TimeoutCause, TrialPhase, TrialSummary,
};
