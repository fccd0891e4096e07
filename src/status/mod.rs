//! Readiness, liveness and last-snapshot endpoints.
//!
//! # Routes
//! - `GET /livez`: reporter loop running
//! - `GET /readyz`: serving and router tiers Healthy in the last snapshot
//! - `GET /snapshot`: last `ClusterSnapshot` as JSON, 404 before the first cycle

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::health::SnapshotStore;
use self::handlers::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn status_router(store: Arc<SnapshotStore>) -> Router {
    let router = Router::new()
        .route("/livez", get(get_livez))
        .route("/readyz", get(get_readyz))
        .route("/snapshot", get(get_snapshot))
        .with_state(store);
    with_layers(router)
}

fn with_layers(router: Router) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}

/// Serve the status routes until shutdown fires.
pub async fn serve(
    addr: SocketAddr,
    store: Arc<SnapshotStore>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Status endpoint listening");

    axum::serve(listener, status_router(store))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
