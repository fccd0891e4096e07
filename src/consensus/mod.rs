//! Leader and quorum verification over the consensus tier.
//!
//! # Data Flow
//! ```text
//! LeaderVerifier::sample(nodes)
//!     → self-status of every node, one pass, concurrently
//!     → LeaderSample { views }
//!         → find_leader:      "are you the leader?"  (0 or 1, else SplitBrainDetected)
//!         → leader_agreement: "who is the leader?"   (1 element when healthy)
//!
//! quorum_write_probe(nodes, key, value)
//!     → liveness of every node → write through the first reachable one
//!     → QuorumDecision (observed, not asserted)
//! ```
//!
//! # Design Decisions
//! - The sentinel only observes consensus; it never decides what quorum is
//! - Split brain is a correctness fault and is returned, never retried away

pub mod leader;
pub mod quorum;

pub use leader::{LeaderSample, LeaderVerifier, LeaderView, SplitBrainDetected};
pub use quorum::QuorumDecision;
