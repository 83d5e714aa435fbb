use agora_engine::Orchestrator;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// The narrow control surface: one administrative operation that starts a
/// tournament by epoch number (manual schedule mode), plus a health probe.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tournament/start", post(start_tournament))
        .with_state(orchestrator)
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    epoch_number: u64,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    enqueued: bool,
    epoch_number: u64,
}

async fn start_tournament(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, (StatusCode, String)> {
    info!(epoch = request.epoch_number, "📡 admin trigger received");
    orchestrator
        .trigger_tournament(request.epoch_number)
        .await
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    Ok(Json(StartResponse {
        enqueued: true,
        epoch_number: request.epoch_number,
    }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    active_tournament: Option<String>,
}

async fn health(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    let active = orchestrator
        .store()
        .active_tournament()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok(Json(HealthResponse {
        status: "ok",
        active_tournament: active.map(|t| t.id.to_hex()),
    }))
}
