use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::cache::DashboardCache;
use crate::metrics::{self, DashboardMetrics};
use crate::models::DashboardSnapshot;
use crate::report;
use crate::warehouse::Warehouse;

/// Long-lived services shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub warehouse: Arc<dyn Warehouse>,
    pub cache: Arc<DashboardCache>,
}

impl AppState {
    pub fn new(warehouse: Arc<dyn Warehouse>, cache: DashboardCache) -> Self {
        Self {
            warehouse,
            cache: Arc::new(cache),
        }
    }
}

#[derive(Debug, Serialize)]
struct SnapshotBody<'a> {
    metrics: DashboardMetrics,
    #[serde(flatten)]
    snapshot: &'a DashboardSnapshot,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/snapshot", get(snapshot_json))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// One render pass: fetch through the cache, then draw the page or the
/// error banner.
pub async fn render_pass(state: &AppState) -> String {
    let outcome = state.cache.snapshot(state.warehouse.as_ref()).await;
    match &outcome {
        Ok(snapshot) => info!(
            suppliers = snapshot.risk_scores.len(),
            alerts = snapshot.alerts.len(),
            "dashboard rendered"
        ),
        Err(err) => error!(error = %err, "dashboard render failed"),
    }
    report::render_page(&outcome, Utc::now())
}

async fn dashboard(State(state): State<AppState>) -> Html<String> {
    Html(render_pass(&state).await)
}

async fn snapshot_json(State(state): State<AppState>) -> Response {
    match state.cache.snapshot(state.warehouse.as_ref()).await {
        Ok(snapshot) => {
            let body = SnapshotBody {
                metrics: metrics::summarize(&snapshot.risk_scores),
                snapshot: &snapshot,
            };
            Json(body).into_response()
        }
        Err(err) => {
            error!(error = %err, "snapshot request failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

pub async fn serve(bind: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "dashboard listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("dashboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
