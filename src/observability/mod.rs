//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics mirror the snapshot fields so dashboards and report logs agree
//! - Metrics are cheap (atomic increments), recording never fails the caller

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
