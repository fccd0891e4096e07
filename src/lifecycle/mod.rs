//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Topology → Prober → reporter / orchestrator
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → reporter exits between cycles → status server drains
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The reporter only observes shutdown between cycles, never mid-snapshot

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{Sentinel, StartupError};
