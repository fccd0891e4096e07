//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a node:
//!     → timeouts.rs (every network call carries an explicit deadline)
//!
//! Bounded wait (promotion, rejoin):
//!     → backoff.rs (jittered delay between polls, capped)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Timeout errors are distinct from connection errors
//! - Jitter keeps concurrent waiters from polling in lockstep

pub mod backoff;
pub mod timeouts;
