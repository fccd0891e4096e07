//! Health report log.
//!
//! # Data Flow
//! ```text
//! ClusterSnapshot (each cycle) / FailoverRecord (each trial)
//!     → sink.rs (serialize to one JSON line)
//!     → <directory>/<prefix>-YYYY-MM-DD.jsonl (append-only)
//! ```
//!
//! # Design Decisions
//! - One record per line, never rewritten
//! - The file is chosen from the record's UTC timestamp, so a day boundary
//!   starts a new file without any rotation step
//! - Each write opens and closes the file; no handle is held across cycles

pub mod sink;

pub use sink::{DailyJsonlSink, JsonlSink, SinkError, SnapshotSink};
