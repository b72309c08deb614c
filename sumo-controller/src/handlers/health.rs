//! Liveness and readiness probes. `/health` only proves the process is
//! serving; `/ready` proves it can reach both the database and the
//! orchestrator, so a load balancer can hold traffic during degraded mode.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::app::App;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub database: bool,
    pub orchestrator: bool,
}

pub async fn ready(State(app): State<App>) -> impl IntoResponse {
    let database = app.pool.get().await.is_ok();
    let orchestrator = app.port.is_available();

    let body = Json(ReadyResponse { database, orchestrator });
    if database && orchestrator {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}
