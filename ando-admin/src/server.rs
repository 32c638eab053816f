use std::sync::Arc;

use ando_observability::GatewayMetrics;
use axum::extract::State;
use axum::routing::get;
use axum::Router as AxumRouter;
use serde_json::{json, Value};
use tracing::info;

/// Shared state for the admin surface: the "health endpoints" the top-level
/// spec treats as an external collaborator, kept here as a thin,
/// uninstrumented surface over the pipeline's metrics (§AMBIENT-METRICS).
#[derive(Clone)]
pub struct AdminState {
    pub metrics: Arc<GatewayMetrics>,
}

/// Build the admin router: `/healthz` liveness, `/metrics` Prometheus
/// exposition. No route/consumer/plugin CRUD — that surface belongs to the
/// configuration layer (§AMBIENT-CONFIG), not to a live admin API, and
/// per-route hot-reload while in-flight is an explicit Non-goal.
pub fn build_router(state: AdminState) -> AxumRouter {
    AxumRouter::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub async fn start(addr: std::net::SocketAddr, state: AdminState) -> anyhow::Result<()> {
    let app = build_router(state);
    info!(%addr, "admin API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> axum::Json<Value> {
    axum::Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics_handler(State(state): State<AdminState>) -> String {
    ando_observability::prometheus_exporter::render_metrics(&state.metrics)
}
