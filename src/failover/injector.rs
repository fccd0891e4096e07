//! Fault-injection boundary.
//!
//! # Responsibilities
//! - Define the `{stop, start}` capability the orchestrator drives
//! - Provide a command-based implementation for real clusters
//!
//! # Design Decisions
//! - Injected into the orchestrator so trials run against an in-memory
//!   cluster in tests and real processes/containers in integration runs
//! - Every command is bounded; a hung `docker stop` fails the trial instead
//!   of stalling it

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::FaultInjectionConfig;
use crate::topology::NodeDescriptor;

/// A stop or start request that did not take effect.
#[derive(Debug, Error)]
pub enum FaultError {
    #[error("no {action} command configured")]
    NotConfigured { action: &'static str },

    #[error("failed to run {action} for '{node}': {source}")]
    Spawn {
        action: &'static str,
        node: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{action} for '{node}' exited with {code:?}: {stderr}")]
    Exit {
        action: &'static str,
        node: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{action} for '{node}' did not finish within {limit:?}")]
    Timeout {
        action: &'static str,
        node: String,
        limit: Duration,
    },

    #[error("{action} for '{node}' rejected: {reason}")]
    Rejected {
        action: &'static str,
        node: String,
        reason: String,
    },
}

/// Start/stop of a node, keyed by its fault handle.
#[async_trait]
pub trait FaultInjector: Send + Sync {
    async fn stop(&self, node: &NodeDescriptor) -> Result<(), FaultError>;

    async fn start(&self, node: &NodeDescriptor) -> Result<(), FaultError>;
}

/// Runs configured argv templates (`{handle}`, `{name}`) as child processes.
#[derive(Debug, Clone)]
pub struct CommandFaultInjector {
    stop_command: Vec<String>,
    start_command: Vec<String>,
    timeout: Duration,
}

impl CommandFaultInjector {
    pub fn new(config: &FaultInjectionConfig) -> Self {
        Self {
            stop_command: config.stop_command.clone(),
            start_command: config.start_command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn run(&self, action: &'static str, template: &[String], node: &NodeDescriptor) -> Result<(), FaultError> {
        let argv = render(template, node);
        let Some((program, args)) = argv.split_first() else {
            return Err(FaultError::NotConfigured { action });
        };

        tracing::info!(node = %node.name, command = ?argv, "Running {} command", action);

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|source| FaultError::Spawn {
                action,
                node: node.name.clone(),
                source,
            })?,
            Err(_) => {
                return Err(FaultError::Timeout {
                    action,
                    node: node.name.clone(),
                    limit: self.timeout,
                })
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(FaultError::Exit {
                action,
                node: node.name.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl FaultInjector for CommandFaultInjector {
    async fn stop(&self, node: &NodeDescriptor) -> Result<(), FaultError> {
        self.run("stop", &self.stop_command, node).await
    }

    async fn start(&self, node: &NodeDescriptor) -> Result<(), FaultError> {
        self.run("start", &self.start_command, node).await
    }
}

/// Substitute node placeholders into an argv template.
fn render(template: &[String], node: &NodeDescriptor) -> Vec<String> {
    template
        .iter()
        .map(|arg| arg.replace("{handle}", &node.fault_handle.0).replace("{name}", &node.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::topology::Topology;

    fn node() -> NodeDescriptor {
        let mut config = NodeConfig::new("etcd-1", "consensus", "10.0.0.5", 2379);
        config.fault_handle = Some("cluster_etcd1_1".into());
        let topology = Topology::from_config(&[config]).unwrap();
        topology.node("etcd-1").unwrap().clone()
    }

    fn injector(stop: &[&str], timeout_secs: u64) -> CommandFaultInjector {
        CommandFaultInjector::new(&FaultInjectionConfig {
            stop_command: stop.iter().map(|s| s.to_string()).collect(),
            start_command: Vec::new(),
            timeout_secs,
        })
    }

    #[test]
    fn test_render_placeholders() {
        let template = vec!["docker".to_string(), "stop".into(), "{handle}".into(), "--label={name}".into()];
        assert_eq!(
            render(&template, &node()),
            vec!["docker", "stop", "cluster_etcd1_1", "--label=etcd-1"]
        );
    }

    #[tokio::test]
    async fn test_empty_command_is_not_configured() {
        let err = injector(&[], 5).start(&node()).await.unwrap_err();
        assert!(matches!(err, FaultError::NotConfigured { action: "start" }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides_success() {
        assert!(injector(&["true"], 5).stop(&node()).await.is_ok());

        let err = injector(&["false"], 5).stop(&node()).await.unwrap_err();
        assert!(matches!(err, FaultError::Exit { action: "stop", .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_command_times_out() {
        let err = injector(&["sleep", "30"], 1).stop(&node()).await.unwrap_err();
        assert!(matches!(err, FaultError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let err = injector(&["/nonexistent/sentinel-fault-tool"], 5)
            .stop(&node())
            .await
            .unwrap_err();
        assert!(matches!(err, FaultError::Spawn { .. }));
    }
}
