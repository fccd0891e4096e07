use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::health::{HealthState, SnapshotStore};

#[derive(Serialize)]
pub struct ProbeStatus {
    pub status: &'static str,
    pub cycles: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_status: Option<HealthState>,
}

/// 200 while the reporter loop is executing.
pub async fn get_livez(State(store): State<Arc<SnapshotStore>>) -> Response {
    let live = store.liveness();
    let body = ProbeStatus {
        status: if live { "alive" } else { "stopped" },
        cycles: store.cycles(),
        overall_status: None,
    };
    let code = if live { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(body)).into_response()
}

/// 200 iff the last snapshot has healthy serving and router tiers.
pub async fn get_readyz(State(store): State<Arc<SnapshotStore>>) -> Response {
    let ready = store.readiness();
    let body = ProbeStatus {
        status: if ready { "ready" } else { "not_ready" },
        cycles: store.cycles(),
        overall_status: store.latest().map(|s| s.overall_status),
    };
    let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(body)).into_response()
}

pub async fn get_snapshot(State(store): State<Arc<SnapshotStore>>) -> Response {
    match store.latest() {
        Some(snapshot) => Json(snapshot.as_ref().clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no snapshot yet" })),
        )
            .into_response(),
    }
}
