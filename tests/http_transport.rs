//! `HttpTransport` against mock nodes speaking the real wire formats.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cluster_sentinel::config::NodeConfig;
use cluster_sentinel::consensus::LeaderVerifier;
use cluster_sentinel::failover::ConsistencyVerifier;
use cluster_sentinel::probe::{HttpTransport, MetricValue, Prober};
use cluster_sentinel::topology::{TierKind, Topology};

mod common;
use common::{node_at, Store};

fn prober() -> Prober {
    let timeout = Duration::from_secs(2);
    Prober::new(Arc::new(HttpTransport::new(timeout)), timeout, common::LAG_THRESHOLD_SECS)
}

fn store() -> Store {
    Arc::new(Mutex::new(HashMap::new()))
}

fn topology(nodes: Vec<NodeConfig>) -> Topology {
    Topology::from_config(&nodes).unwrap()
}

#[tokio::test]
async fn test_consensus_probe_and_leader() {
    let shared = store();
    let mut nodes = Vec::new();
    for name in ["etcd-1", "etcd-2", "etcd-3"] {
        let addr = common::start_mock_consensus(name, "etcd-1", shared.clone()).await;
        nodes.push(node_at(name, "consensus", addr));
    }
    let topology = topology(nodes);
    let members = topology.tier(TierKind::Consensus);
    let prober = prober();

    let result = prober.probe(&members[0]).await;
    assert!(result.healthy, "error: {:?}", result.error);
    assert!(result.reports_leader());
    assert_eq!(result.metric("state").and_then(MetricValue::as_str), Some("StateLeader"));
    assert!(!prober.probe(&members[1]).await.reports_leader());

    let verifier = LeaderVerifier::new(prober.clone());
    let leader = verifier.find_leader(members).await.unwrap().unwrap();
    assert_eq!(leader.name, "etcd-1");
    assert_eq!(
        verifier.leader_agreement(members).await,
        BTreeSet::from(["etcd-1".to_string()])
    );

    let decision = verifier.quorum_write_probe(members, "probe-42", "v").await;
    assert!(decision.accepted, "error: {:?}", decision.error);
    assert_eq!(prober.read(&members[2], "probe-42").await.unwrap().as_deref(), Some("v"));
    assert_eq!(prober.read(&members[2], "probe-missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_serving_status_metrics() {
    let addr = common::start_mock_serving(false, 1.5, store()).await;
    let topology = topology(vec![node_at("pg-2", "serving-replica", addr)]);
    let result = prober().probe(&topology.tier(TierKind::Serving)[0]).await;

    assert!(result.healthy, "error: {:?}", result.error);
    assert_eq!(result.metric("role").and_then(MetricValue::as_str), Some("replica"));
    assert_eq!(result.metric("connections_total").and_then(MetricValue::as_f64), Some(11.0));
    assert_eq!(
        result.metric("connections_idle_in_transaction").and_then(MetricValue::as_f64),
        Some(1.0)
    );
    assert_eq!(result.metric("replication_delay_secs").and_then(MetricValue::as_f64), Some(1.5));
    assert_eq!(result.metric("cache_hit_ratio").and_then(MetricValue::as_f64), Some(0.97));
}

#[tokio::test]
async fn test_round_trip_primary_to_replica() {
    let replicated = store();
    let primary = common::start_mock_serving(true, 0.0, replicated.clone()).await;
    let replica = common::start_mock_serving(false, 0.2, replicated).await;
    let detached = common::start_mock_serving(false, 0.2, store()).await;

    let topology = topology(vec![
        node_at("pg-1", "serving-primary", primary),
        node_at("pg-2", "serving-replica", replica),
        node_at("pg-3", "serving-replica", detached),
    ]);
    let nodes = topology.tier(TierKind::Serving);
    let verifier = ConsistencyVerifier::new(prober(), Duration::from_millis(50));

    let report = verifier
        .write_then_verify(&nodes[0], &nodes[..2], "probe-42", "v")
        .await
        .unwrap();
    assert!(report.is_consistent(), "missing on {:?}", report.missing_nodes());

    let report = verifier
        .write_then_verify(&nodes[0], nodes, "probe-43", "v")
        .await
        .unwrap();
    assert_eq!(report.missing_nodes(), vec!["pg-3".to_string()]);
}

#[tokio::test]
async fn test_error_status_is_unhealthy() {
    let addr = common::start_failing_node().await;
    let topology = topology(vec![node_at("etcd-1", "consensus", addr)]);
    let result = prober().probe(&topology.tier(TierKind::Consensus)[0]).await;

    assert!(!result.healthy);
    assert!(result.error.unwrap().contains("unexpected status 500"));
}

#[tokio::test]
async fn test_refused_connection_is_unhealthy() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let topology = topology(vec![node_at("pg-1", "serving-primary", addr)]);
    let result = prober().probe(&topology.tier(TierKind::Serving)[0]).await;

    assert!(!result.healthy);
    assert!(result.error.unwrap().starts_with("connection failed"));
}

#[tokio::test]
async fn test_router_passthrough_and_stats() {
    let router = common::start_tcp_sink().await;
    let stats = common::start_failing_node().await;

    let mut config = node_at("haproxy", "router", router);
    config.stats_url = Some(format!("http://{}/stats", stats));
    let topology = topology(vec![config]);
    let result = prober().probe(&topology.tier(TierKind::Router)[0]).await;

    assert!(result.healthy, "error: {:?}", result.error);
    assert!(result.metric("connect_ms").is_some());
    assert_eq!(result.metric("stats_available").and_then(MetricValue::as_f64), Some(0.0));
}
