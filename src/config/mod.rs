//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, SENTINEL_* env overrides)
//!     → validation.rs (semantic checks)
//!     → SentinelConfig (validated, immutable)
//!     → topology built once at startup, shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the topology never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::SentinelConfig;
pub use schema::{
    FailoverConfig, FaultInjectionConfig, MonitorConfig, NodeConfig, ObservabilityConfig,
    ReportConfig, StatusConfig, TrialTarget,
};
