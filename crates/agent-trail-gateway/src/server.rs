//! Axum-based gateway server.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::relay;
use crate::state::GatewayState;

/// Start the gateway HTTP server.
///
/// When `ui_enabled` is true, the embedded chat UI is served at `/`.
pub async fn start_gateway(
    state: Arc<GatewayState>,
    port: u16,
    ui_enabled: bool,
) -> anyhow::Result<()> {
    let bind_addr = state
        .config
        .gateway
        .as_ref()
        .and_then(|g| g.bind.clone())
        .unwrap_or_else(|| "0.0.0.0".to_string());

    // API routes are registered first so they take priority over the UI routes
    let mut app = Router::new()
        .route("/api/run", post(relay::run_handler))
        .route("/api/run/{run_id}", get(relay::get_run_handler))
        .route("/api/summarize", post(relay::summarize_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    if ui_enabled {
        app = app.merge(agent_trail_web::ui_router());
        info!("Chat UI available at http://{bind_addr}:{port}/");
    }

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();

    axum::Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime,
        "runs_started": state.runs_started.load(std::sync::atomic::Ordering::SeqCst),
        "runs_active": state.runs_active.load(std::sync::atomic::Ordering::SeqCst),
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
