//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sentinel.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the cluster sentinel.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SentinelConfig {
    /// Continuous health monitor settings.
    pub monitor: MonitorConfig,

    /// Failover trial settings.
    pub failover: FailoverConfig,

    /// External start/stop primitive.
    pub fault_injection: FaultInjectionConfig,

    /// Health report log settings.
    pub report: ReportConfig,

    /// Readiness/liveness HTTP surface.
    pub status: StatusConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Node topology, one entry per node across all tiers.
    pub nodes: Vec<NodeConfig>,
}

/// Health monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between health cycles in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in milliseconds.
    pub probe_timeout_ms: u64,

    /// Replica delay above which a replica is reported unhealthy.
    pub replication_lag_threshold_secs: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            probe_timeout_ms: 2000,
            replication_lag_threshold_secs: 5.0,
        }
    }
}

/// Which tier a failover trial removes the leader/primary from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialTarget {
    Consensus,
    Serving,
}

impl TrialTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            TrialTarget::Consensus => "consensus",
            TrialTarget::Serving => "serving",
        }
    }
}

impl std::fmt::Display for TrialTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrialTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consensus" => Ok(TrialTarget::Consensus),
            "serving" => Ok(TrialTarget::Serving),
            other => Err(format!("unknown trial target '{}'", other)),
        }
    }
}

/// Failover trial configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Upper bound on promotion/re-election after fault injection, in seconds.
    pub wait_timeout_secs: u64,

    /// Poll interval while awaiting promotion, in milliseconds.
    pub poll_interval_ms: u64,

    /// Replication grace window before a consistency read, in milliseconds.
    pub grace_ms: u64,

    /// Upper bound on the restarted node rejoining, in seconds.
    pub rejoin_timeout_secs: u64,

    /// Number of trials the one-shot runner executes.
    pub trials: u32,

    /// Tier targeted by default.
    pub target: TrialTarget,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 30,
            poll_interval_ms: 1000,
            grace_ms: 1000,
            rejoin_timeout_secs: 60,
            trials: 1,
            target: TrialTarget::Consensus,
        }
    }
}

/// External fault-injection commands.
///
/// Each command is an argv array; `{handle}` and `{name}` are substituted
/// with the node's fault handle and name.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FaultInjectionConfig {
    pub stop_command: Vec<String>,
    pub start_command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for FaultInjectionConfig {
    fn default() -> Self {
        Self {
            stop_command: vec!["docker".into(), "stop".into(), "{handle}".into()],
            start_command: vec!["docker".into(), "start".into(), "{handle}".into()],
            timeout_secs: 60,
        }
    }
}

/// Health report log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory holding one newline-delimited JSON file per UTC day.
    pub directory: String,

    /// File name prefix.
    pub prefix: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            directory: "reports".to_string(),
            prefix: "cluster-health".to_string(),
        }
    }
}

/// Readiness/liveness endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub bind_address: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8088".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "json" or "pretty".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Single node definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Unique node identifier.
    pub name: String,

    /// One of `serving-primary`, `serving-replica`, `consensus`, `router`.
    pub role: String,

    /// Host name or IP.
    pub host: String,

    /// Service port (router passthrough, consensus client port).
    pub port: u16,

    /// HTTP status/API port if different from `port`.
    #[serde(default)]
    pub api_port: Option<u16>,

    /// Whether this node's failure makes its tier unhealthy.
    #[serde(default)]
    pub critical: Option<bool>,

    /// Handle passed to the fault injector (defaults to `name`).
    #[serde(default)]
    pub fault_handle: Option<String>,

    /// Optional router statistics page.
    #[serde(default)]
    pub stats_url: Option<String>,
}

impl NodeConfig {
    /// Minimal node definition with everything optional left unset.
    pub fn new(name: &str, role: &str, host: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
            host: host.to_string(),
            port,
            api_port: None,
            critical: None,
            fault_handle: None,
            stats_url: None,
        }
    }
}
