//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define sentinel metrics (node health, lag, cache, failover timing)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-node, per-tier and cluster-level values
//!
//! # Metrics
//! - `sentinel_node_up` (gauge): 1=healthy, 0=unhealthy, by tier/node
//! - `sentinel_probe_duration_seconds` (histogram): probe latency by tier
//! - `sentinel_connections` (gauge): sessions by node/state
//! - `sentinel_replication_lag_seconds` (gauge): replica delay by node
//! - `sentinel_cache_hit_ratio` (gauge): by node
//! - `sentinel_tier_status` / `sentinel_cluster_status` (gauge): 0/1/2 severity
//! - `sentinel_failover_seconds` (histogram): promotion time by trial kind
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels: tier, node, state, kind, outcome
//! - Recording before `init_metrics` is a no-op

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::HealthState;
use crate::probe::{MetricValue, ProbeResult};
use crate::topology::TierKind;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one node probe.
pub fn record_probe(tier: TierKind, result: &ProbeResult, elapsed: Duration) {
    let node = result.name.clone();
    gauge!("sentinel_node_up", "tier" => tier.as_str(), "node" => node.clone())
        .set(if result.healthy { 1.0 } else { 0.0 });
    histogram!("sentinel_probe_duration_seconds", "tier" => tier.as_str()).record(elapsed.as_secs_f64());
    if !result.healthy {
        counter!("sentinel_probe_failures_total", "tier" => tier.as_str(), "node" => node.clone())
            .increment(1);
    }

    for (key, value) in &result.metrics {
        let Some(number) = value.as_f64() else { continue };
        if key == "connections_total" {
            continue;
        }
        if let Some(state) = key.strip_prefix("connections_") {
            gauge!("sentinel_connections", "node" => node.clone(), "state" => state.to_string()).set(number);
        }
    }
    if let Some(lag) = result.metric("replication_delay_secs").and_then(MetricValue::as_f64) {
        gauge!("sentinel_replication_lag_seconds", "node" => node.clone()).set(lag);
    }
    if let Some(ratio) = result.metric("cache_hit_ratio").and_then(MetricValue::as_f64) {
        gauge!("sentinel_cache_hit_ratio", "node" => node).set(ratio);
    }
}

pub fn record_tier_status(tier: TierKind, state: HealthState) {
    gauge!("sentinel_tier_status", "tier" => tier.as_str()).set(state.severity() as f64);
}

pub fn record_cluster_status(state: HealthState) {
    gauge!("sentinel_cluster_status").set(state.severity() as f64);
}

/// Record a completed (or failed) reporter cycle.
pub fn record_cycle(elapsed: Duration, succeeded: bool) {
    counter!("sentinel_cycles_total").increment(1);
    if succeeded {
        histogram!("sentinel_cycle_duration_seconds").record(elapsed.as_secs_f64());
    } else {
        counter!("sentinel_cycle_failures_total").increment(1);
    }
}

pub fn record_split_brain(tier: TierKind) {
    counter!("sentinel_split_brain_total", "tier" => tier.as_str()).increment(1);
}

/// Number of distinct leader identities the consensus tier reported.
pub fn record_leader_views(distinct: usize) {
    gauge!("sentinel_leader_views").set(distinct as f64);
}

/// Record a finished failover trial.
pub fn record_failover(kind: &'static str, passed: bool, elapsed: Option<Duration>) {
    let outcome = if passed { "passed" } else { "failed" };
    counter!("sentinel_failover_trials_total", "kind" => kind, "outcome" => outcome).increment(1);
    if let Some(elapsed) = elapsed {
        histogram!("sentinel_failover_seconds", "kind" => kind).record(elapsed.as_secs_f64());
    }
}
