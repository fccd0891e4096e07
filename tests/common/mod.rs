//! Shared utilities for integration tests.
//!
//! `SimCluster` is an in-memory cluster that answers probes and obeys
//! stop/start requests. Elections happen lazily on the next query once
//! `ELECTION_DELAY` has passed and a majority is up, so tests running with
//! paused time stay deterministic. The axum mock nodes speak the real wire
//! format for `HttpTransport` tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Form, Json, Router,
};
use tokio::net::TcpListener;
use tokio::time::Instant;

use cluster_sentinel::config::{FailoverConfig, NodeConfig, TrialTarget};
use cluster_sentinel::failover::{FaultError, FaultInjector};
use cluster_sentinel::probe::{ConsensusSelf, NodeTransport, ProbeError, Prober, ServingStatus};
use cluster_sentinel::topology::{quorum_size, NodeDescriptor, TierKind, Topology};

pub const ELECTION_DELAY: Duration = Duration::from_secs(3);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const LAG_THRESHOLD_SECS: f64 = 5.0;

/// pg-1 (primary), pg-2, pg-3, etcd-1..3 and one router.
pub fn cluster_topology() -> Arc<Topology> {
    let nodes = vec![
        NodeConfig::new("pg-1", "serving-primary", "10.0.1.1", 5432),
        NodeConfig::new("pg-2", "serving-replica", "10.0.1.2", 5432),
        NodeConfig::new("pg-3", "serving-replica", "10.0.1.3", 5432),
        NodeConfig::new("etcd-1", "consensus", "10.0.2.1", 2379),
        NodeConfig::new("etcd-2", "consensus", "10.0.2.2", 2379),
        NodeConfig::new("etcd-3", "consensus", "10.0.2.3", 2379),
        NodeConfig::new("haproxy", "router", "10.0.3.1", 5000),
    ];
    Arc::new(Topology::from_config(&nodes).unwrap())
}

pub fn prober(sim: &Arc<SimCluster>) -> Prober {
    Prober::new(sim.clone(), PROBE_TIMEOUT, LAG_THRESHOLD_SECS)
}

pub fn failover_config(target: TrialTarget) -> FailoverConfig {
    FailoverConfig {
        wait_timeout_secs: 30,
        poll_interval_ms: 1000,
        grace_ms: 500,
        rejoin_timeout_secs: 60,
        trials: 1,
        target,
    }
}

#[derive(Default)]
struct SimState {
    consensus: Vec<String>,
    serving: Vec<String>,
    down: HashSet<String>,
    hung: HashSet<String>,
    restarted_at: HashMap<String, Instant>,
    leader: Option<String>,
    leader_lost_at: Option<Instant>,
    primary: Option<String>,
    primary_lost_at: Option<Instant>,
    kv: HashMap<String, String>,
    records: HashMap<String, String>,
    lagging: HashSet<String>,
    replication_delay: HashMap<String, f64>,
    split_brain: bool,
    rogue_primary: Option<String>,
    rejoin_as_leader: bool,
    never_elect: bool,
    refuse_stop: HashSet<String>,
    stops: Vec<String>,
    starts: Vec<String>,
}

impl SimState {
    fn up(&self, name: &str) -> bool {
        !self.down.contains(name)
    }

    fn eligible(&self, name: &str, now: Instant) -> bool {
        self.up(name)
            && !self.lagging.contains(name)
            && self
                .restarted_at
                .get(name)
                .map_or(true, |at| now >= *at + ELECTION_DELAY)
    }

    fn has_quorum(&self) -> bool {
        let up = self.consensus.iter().filter(|m| self.up(m)).count();
        up >= quorum_size(self.consensus.len())
    }

    /// Run any election that is due.
    fn tick(&mut self) {
        let now = Instant::now();
        if self.never_elect {
            return;
        }

        if self.leader.is_none() && self.has_quorum() {
            if let Some(lost) = self.leader_lost_at {
                if now >= lost + ELECTION_DELAY {
                    self.leader = self.consensus.iter().find(|m| self.eligible(m, now)).cloned();
                }
            }
        }

        if self.primary.is_none() {
            if let Some(lost) = self.primary_lost_at {
                if now >= lost + ELECTION_DELAY {
                    self.primary = self.serving.iter().find(|n| self.eligible(n, now)).cloned();
                }
            }
        }
    }

    fn mark_down(&mut self, name: &str) {
        self.down.insert(name.to_string());
        if self.leader.as_deref() == Some(name) {
            self.leader = None;
            self.leader_lost_at = Some(Instant::now());
        }
        if self.primary.as_deref() == Some(name) {
            self.primary = None;
            self.primary_lost_at = Some(Instant::now());
        }
    }
}

/// In-memory cluster implementing both the probe transport and fault injection.
pub struct SimCluster {
    state: Mutex<SimState>,
}

impl SimCluster {
    pub fn new(topology: &Topology) -> Arc<Self> {
        let names = |kind: TierKind| {
            topology
                .tier(kind)
                .iter()
                .map(|n: &NodeDescriptor| n.name.clone())
                .collect::<Vec<_>>()
        };
        let consensus = names(TierKind::Consensus);
        let state = SimState {
            leader: consensus.first().cloned(),
            consensus,
            serving: names(TierKind::Serving),
            primary: topology.configured_primary().map(|n| n.name.clone()),
            ..Default::default()
        };
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        state.tick();
        f(&mut state)
    }

    /// Answer like a real node would: hang, refuse, or let the call through.
    async fn gate(&self, node: &NodeDescriptor) -> Result<(), ProbeError> {
        let (hung, down) = {
            let state = self.state.lock().unwrap();
            (state.hung.contains(&node.name), state.down.contains(&node.name))
        };
        if hung {
            std::future::pending::<()>().await;
        }
        if down {
            return Err(ProbeError::Connection(format!("{}: connection refused", node.address())));
        }
        Ok(())
    }

    pub fn leader(&self) -> Option<String> {
        self.with(|s| s.leader.clone())
    }

    pub fn primary(&self) -> Option<String> {
        self.with(|s| s.primary.clone())
    }

    pub fn take_down(&self, name: &str) {
        self.with(|s| s.mark_down(name));
    }

    pub fn hang(&self, name: &str) {
        self.with(|s| s.hung.insert(name.to_string()));
    }

    pub fn set_lagging(&self, name: &str) {
        self.with(|s| s.lagging.insert(name.to_string()));
    }

    pub fn set_replication_delay(&self, name: &str, secs: f64) {
        self.with(|s| s.replication_delay.insert(name.to_string(), secs));
    }

    pub fn set_split_brain(&self, on: bool) {
        self.with(|s| s.split_brain = on);
    }

    /// A replica that also reports the primary role.
    pub fn set_rogue_primary(&self, name: &str) {
        self.with(|s| s.rogue_primary = Some(name.to_string()));
    }

    pub fn set_rejoin_as_leader(&self, on: bool) {
        self.with(|s| s.rejoin_as_leader = on);
    }

    pub fn set_never_elect(&self, on: bool) {
        self.with(|s| s.never_elect = on);
    }

    pub fn refuse_stop(&self, name: &str) {
        self.with(|s| s.refuse_stop.insert(name.to_string()));
    }

    pub fn stops(&self) -> Vec<String> {
        self.with(|s| s.stops.clone())
    }

    pub fn starts(&self) -> Vec<String> {
        self.with(|s| s.starts.clone())
    }
}

#[async_trait]
impl NodeTransport for SimCluster {
    async fn liveness(&self, node: &NodeDescriptor) -> Result<(), ProbeError> {
        self.gate(node).await
    }

    async fn serving_status(&self, node: &NodeDescriptor) -> Result<ServingStatus, ProbeError> {
        self.gate(node).await?;
        Ok(self.with(|s| {
            let name = Some(node.name.as_str());
            let in_recovery = s.primary.as_deref() != name && s.rogue_primary.as_deref() != name;
            let mut connections = BTreeMap::new();
            connections.insert("active".to_string(), 2);
            connections.insert("idle".to_string(), 5);
            ServingStatus {
                in_recovery,
                connections,
                replication_delay_secs: in_recovery
                    .then(|| s.replication_delay.get(&node.name).copied().unwrap_or(0.0)),
                cache_hit_ratio: Some(0.99),
            }
        }))
    }

    async fn consensus_self(&self, node: &NodeDescriptor) -> Result<ConsensusSelf, ProbeError> {
        self.gate(node).await?;
        Ok(self.with(|s| {
            let claimants: Vec<&String> = if s.split_brain {
                s.consensus.iter().filter(|m| s.up(m)).take(2).collect()
            } else {
                s.leader.iter().collect()
            };
            let is_leader = claimants.iter().any(|m| **m == node.name);
            ConsensusSelf {
                name: node.name.clone(),
                member_id: node.name.clone(),
                state: if is_leader { "StateLeader" } else { "StateFollower" }.to_string(),
                is_leader,
                leader_id: if is_leader { Some(node.name.clone()) } else { s.leader.clone() },
            }
        }))
    }

    async fn router_stats(&self, node: &NodeDescriptor) -> Result<(), ProbeError> {
        self.gate(node).await
    }

    async fn write(&self, node: &NodeDescriptor, key: &str, value: &str) -> Result<(), ProbeError> {
        self.gate(node).await?;
        self.with(|s| {
            let rejected = |status| ProbeError::Status {
                status,
                url: format!("sim://{}/{}", node.name, key),
            };
            match node.kind() {
                TierKind::Consensus => {
                    if !s.has_quorum() || s.leader.is_none() {
                        return Err(rejected(503));
                    }
                    s.kv.insert(key.to_string(), value.to_string());
                    Ok(())
                }
                TierKind::Serving => {
                    if s.primary.as_deref() != Some(node.name.as_str()) {
                        return Err(rejected(403));
                    }
                    s.records.insert(key.to_string(), value.to_string());
                    Ok(())
                }
                TierKind::Router => Err(ProbeError::Unsupported("router".into())),
            }
        })
    }

    async fn read(&self, node: &NodeDescriptor, key: &str) -> Result<Option<String>, ProbeError> {
        self.gate(node).await?;
        Ok(self.with(|s| {
            if s.lagging.contains(&node.name) {
                return None;
            }
            match node.kind() {
                TierKind::Consensus => s.kv.get(key).cloned(),
                TierKind::Serving => s.records.get(key).cloned(),
                TierKind::Router => None,
            }
        }))
    }
}

#[async_trait]
impl FaultInjector for SimCluster {
    async fn stop(&self, node: &NodeDescriptor) -> Result<(), FaultError> {
        self.with(|s| {
            if s.refuse_stop.contains(&node.name) {
                return Err(FaultError::Rejected {
                    action: "stop",
                    node: node.name.clone(),
                    reason: "container is protected".into(),
                });
            }
            s.stops.push(node.name.clone());
            s.mark_down(&node.name);
            Ok(())
        })
    }

    async fn start(&self, node: &NodeDescriptor) -> Result<(), FaultError> {
        self.with(|s| {
            s.starts.push(node.name.clone());
            s.down.remove(&node.name);
            s.restarted_at.insert(node.name.clone(), Instant::now());
            if s.rejoin_as_leader {
                match node.kind() {
                    TierKind::Consensus => s.leader = Some(node.name.clone()),
                    TierKind::Serving => s.primary = Some(node.name.clone()),
                    TierKind::Router => {}
                }
            }
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Mock nodes speaking the real wire format.
// ---------------------------------------------------------------------------

pub type Store = Arc<Mutex<HashMap<String, String>>>;

#[derive(Clone)]
struct ConsensusMock {
    name: String,
    leader_id: String,
    store: Store,
}

/// Start an etcd v2-style node on an ephemeral port.
pub async fn start_mock_consensus(name: &str, leader_id: &str, store: Store) -> SocketAddr {
    let state = ConsensusMock {
        name: name.to_string(),
        leader_id: leader_id.to_string(),
        store,
    };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({ "health": "true" })) }))
        .route(
            "/v2/stats/self",
            get(|State(s): State<ConsensusMock>| async move {
                let state = if s.name == s.leader_id { "StateLeader" } else { "StateFollower" };
                Json(serde_json::json!({
                    "name": s.name,
                    "id": s.name,
                    "state": state,
                    "leaderInfo": { "leader": s.leader_id }
                }))
            }),
        )
        .route(
            "/v2/keys/{*key}",
            get(
                |State(s): State<ConsensusMock>, Path(key): Path<String>| async move {
                    match s.store.lock().unwrap().get(&key) {
                        Some(value) => (
                            StatusCode::OK,
                            Json(serde_json::json!({ "action": "get", "node": { "key": key, "value": value } })),
                        ),
                        None => (
                            StatusCode::NOT_FOUND,
                            Json(serde_json::json!({ "errorCode": 100, "message": "Key not found" })),
                        ),
                    }
                },
            )
            .put(
                |State(s): State<ConsensusMock>,
                 Path(key): Path<String>,
                 Form(form): Form<HashMap<String, String>>| async move {
                    let value = form.get("value").cloned().unwrap_or_default();
                    s.store.lock().unwrap().insert(key.clone(), value.clone());
                    (
                        StatusCode::CREATED,
                        Json(serde_json::json!({ "action": "set", "node": { "key": key, "value": value } })),
                    )
                },
            ),
        )
        .with_state(state);

    serve(app).await
}

#[derive(Clone)]
struct ServingMock {
    primary: bool,
    delay_secs: f64,
    store: Store,
}

/// Start a serving-node status agent on an ephemeral port.
pub async fn start_mock_serving(primary: bool, delay_secs: f64, store: Store) -> SocketAddr {
    let state = ServingMock {
        primary,
        delay_secs,
        store,
    };

    let app = Router::new()
        .route("/liveness", get(|| async { "ok" }))
        .route(
            "/status",
            get(|State(s): State<ServingMock>| async move {
                let delay = (!s.primary).then_some(s.delay_secs);
                Json(serde_json::json!({
                    "in_recovery": !s.primary,
                    "connections": { "active": 3, "idle": 7, "idle in transaction": 1 },
                    "replication_delay_secs": delay,
                    "cache_hit_ratio": 0.97
                }))
            }),
        )
        .route(
            "/records/{key}",
            get(
                |State(s): State<ServingMock>, Path(key): Path<String>| async move {
                    match s.store.lock().unwrap().get(&key) {
                        Some(value) => (StatusCode::OK, value.clone()),
                        None => (StatusCode::NOT_FOUND, String::new()),
                    }
                },
            )
            .put(
                |State(s): State<ServingMock>, Path(key): Path<String>, body: String| async move {
                    if !s.primary {
                        return StatusCode::FORBIDDEN;
                    }
                    s.store.lock().unwrap().insert(key, body);
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .with_state(state);

    serve(app).await
}

/// A node whose API always answers 500.
pub async fn start_failing_node() -> SocketAddr {
    let app = Router::new().fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR });
    serve(app).await
}

/// Accepts TCP connections and drops them, like a passthrough router.
pub async fn start_tcp_sink() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    addr
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Node config pointing at a mock listening on `addr`.
pub fn node_at(name: &str, role: &str, addr: SocketAddr) -> NodeConfig {
    NodeConfig::new(name, role, &addr.ip().to_string(), addr.port())
}
