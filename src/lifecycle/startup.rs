//! Startup wiring.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Build the topology and the shared prober
//! - Hand out reporter, orchestrator and report sink built from one config
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - One `Prober` (and one transport) shared by every component

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{load_config, ConfigError, SentinelConfig};
use crate::failover::{CommandFaultInjector, FailoverOrchestrator, FaultInjector};
use crate::health::{HealthReporter, SnapshotStore};
use crate::probe::{HttpTransport, Prober};
use crate::report::DailyJsonlSink;
use crate::topology::{Topology, TopologyError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("invalid {field} '{value}'")]
    Address { field: &'static str, value: String },
}

/// Everything built once from configuration.
#[derive(Debug)]
pub struct Sentinel {
    pub config: SentinelConfig,
    pub topology: Arc<Topology>,
    pub prober: Prober,
}

impl Sentinel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        Self::from_config(load_config(path.as_ref())?)
    }

    /// Build from an already validated config.
    pub fn from_config(config: SentinelConfig) -> Result<Self, StartupError> {
        let topology = Arc::new(Topology::from_config(&config.nodes)?);
        let timeout = Duration::from_millis(config.monitor.probe_timeout_ms);
        let prober = Prober::new(
            Arc::new(HttpTransport::new(timeout)),
            timeout,
            config.monitor.replication_lag_threshold_secs,
        );

        tracing::info!(
            nodes = config.nodes.len(),
            interval_secs = config.monitor.interval_secs,
            probe_timeout_ms = config.monitor.probe_timeout_ms,
            "Sentinel configured"
        );
        Ok(Self {
            config,
            topology,
            prober,
        })
    }

    pub fn report_sink(&self) -> DailyJsonlSink {
        DailyJsonlSink::new(&self.config.report.directory, &self.config.report.prefix)
    }

    pub fn reporter(&self, store: Arc<SnapshotStore>) -> HealthReporter {
        HealthReporter::new(
            self.topology.clone(),
            self.prober.clone(),
            store,
            Duration::from_secs(self.config.monitor.interval_secs),
        )
        .with_sink(Arc::new(self.report_sink()))
    }

    pub fn orchestrator(&self) -> FailoverOrchestrator {
        let injector: Arc<dyn FaultInjector> = Arc::new(CommandFaultInjector::new(&self.config.fault_injection));
        FailoverOrchestrator::new(
            self.topology.clone(),
            self.prober.clone(),
            injector,
            self.config.failover.clone(),
        )
    }

    pub fn status_address(&self) -> Result<SocketAddr, StartupError> {
        parse_address("status.bind_address", &self.config.status.bind_address)
    }

    pub fn metrics_address(&self) -> Result<SocketAddr, StartupError> {
        parse_address("observability.metrics_address", &self.config.observability.metrics_address)
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|_| StartupError::Address {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::topology::TierKind;

    fn config() -> SentinelConfig {
        SentinelConfig {
            nodes: vec![
                NodeConfig::new("pg-1", "serving-primary", "10.0.0.1", 5432),
                NodeConfig::new("etcd-1", "consensus", "10.0.0.2", 2379),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_build_from_config() {
        let sentinel = Sentinel::from_config(config()).unwrap();
        assert_eq!(sentinel.topology.tier(TierKind::Serving).len(), 1);
        assert_eq!(sentinel.prober.timeout(), Duration::from_millis(2000));
        assert_eq!(sentinel.status_address().unwrap().port(), 8088);
        assert_eq!(sentinel.metrics_address().unwrap().port(), 9090);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[monitor]\ninterval_secs = 5\n\n[[nodes]]\nname = \"etcd-1\"\nrole = \"consensus\"\nhost = \"10.0.0.2\"\nport = 2379"
        )
        .unwrap();

        let sentinel = Sentinel::load(file.path()).unwrap();
        assert_eq!(sentinel.config.monitor.interval_secs, 5);
        assert_eq!(sentinel.topology.tier(TierKind::Consensus).len(), 1);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        assert!(matches!(
            Sentinel::load("/nonexistent/sentinel.toml"),
            Err(StartupError::Config(_))
        ));
    }

    #[test]
    fn test_bad_address() {
        let mut config = config();
        config.status.bind_address = "not-an-address".into();
        let sentinel = Sentinel::from_config(config).unwrap();
        assert!(matches!(
            sentinel.status_address(),
            Err(StartupError::Address { field: "status.bind_address", .. })
        ));
    }

    #[test]
    fn test_bad_role_is_topology_error() {
        let mut config = config();
        config.nodes.push(NodeConfig::new("x", "witness", "10.0.0.3", 1));
        assert!(matches!(
            Sentinel::from_config(config),
            Err(StartupError::Topology(_))
        ));
    }
}
