//! Cluster Sentinel
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │               CLUSTER SENTINEL                │
//!                       │                                               │
//!   serving  ◀──probe───┤  health::reporter ──▶ report (jsonl per day)  │
//!   consensus◀──probe───┤        │          ──▶ SnapshotStore ──▶ status│
//!   router   ◀──probe───┤        ▼                                      │
//!                       │  observability (tracing, prometheus)          │
//!                       │                                               │
//!   fault    ◀─stop/start─ failover::orchestrator ──▶ consensus verifier│
//!   injector            │        └──▶ consistency verifier              │
//!                       └──────────────────────────────────────────────┘
//! ```
//!
//! `monitor` runs until SIGINT/SIGTERM. `failover` runs trials once and
//! exits non-zero if any trial failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use cluster_sentinel::config::TrialTarget;
use cluster_sentinel::lifecycle::{wait_for_signal, Sentinel, Shutdown};
use cluster_sentinel::observability::{init_tracing, metrics};
use cluster_sentinel::{status, SnapshotStore};

#[derive(Parser)]
#[command(name = "cluster-sentinel", version)]
#[command(about = "Health monitor and failover verifier for replicated clusters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every tier on a fixed interval until stopped
    Monitor {
        #[arg(short, long, default_value = "sentinel.toml")]
        config: PathBuf,
    },
    /// Run failover trials and report
    Failover {
        #[arg(short, long, default_value = "sentinel.toml")]
        config: PathBuf,

        /// Number of trials (defaults to failover.trials)
        #[arg(long)]
        trials: Option<u32>,

        /// Tier whose leader/primary is removed
        #[arg(long)]
        target: Option<TrialTarget>,

        /// Stop these consensus members together instead of a leader trial
        #[arg(long, value_delimiter = ',')]
        quorum_loss: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor { config } => monitor(&config).await,
        Commands::Failover {
            config,
            trials,
            target,
            quorum_loss,
        } => {
            if !failover(&config, trials, target, &quorum_loss).await? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn start(path: &Path) -> Result<Sentinel, Box<dyn std::error::Error>> {
    let sentinel = Sentinel::load(path)?;
    init_tracing(&sentinel.config.observability);
    tracing::info!(config = %path.display(), "cluster-sentinel v{} starting", env!("CARGO_PKG_VERSION"));

    if sentinel.config.observability.metrics_enabled {
        metrics::init_metrics(sentinel.metrics_address()?);
    }
    Ok(sentinel)
}

async fn monitor(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let sentinel = start(path)?;
    let store = Arc::new(SnapshotStore::new());
    let shutdown = Shutdown::new();

    let status_server = if sentinel.config.status.enabled {
        let addr = sentinel.status_address()?;
        Some(tokio::spawn(status::serve(addr, store.clone(), shutdown.subscribe())))
    } else {
        None
    };

    let reporter = tokio::spawn(sentinel.reporter(store.clone()).run(shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();

    reporter.await?;
    if let Some(server) = status_server {
        if let Err(e) = server.await? {
            tracing::error!(error = %e, "Status server error");
        }
    }

    tracing::info!(cycles = store.cycles(), "Shutdown complete");
    Ok(())
}

async fn failover(
    path: &Path,
    trials: Option<u32>,
    target: Option<TrialTarget>,
    quorum_loss: &[String],
) -> Result<bool, Box<dyn std::error::Error>> {
    let sentinel = start(path)?;
    let orchestrator = sentinel.orchestrator();
    let sink = sentinel.report_sink();

    if !quorum_loss.is_empty() {
        let record = orchestrator.run_quorum_loss_trial(quorum_loss).await;
        if let Err(e) = sink.append(record.finished_at, &record) {
            tracing::error!(error = %e, "Failed to write trial record");
        }
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(record.passed());
    }

    let target = target.unwrap_or(sentinel.config.failover.target);
    let trials = trials.unwrap_or(sentinel.config.failover.trials);
    let summary = orchestrator.run_trials(trials, target).await;

    for record in &summary.records {
        if let Err(e) = sink.append(record.finished_at, record) {
            tracing::error!(trial_id = %record.trial_id, error = %e, "Failed to write trial record");
        }
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary.all_passed())
}
