//! Health check endpoints
//!
//! `/health/live` answers whenever the process is up; `/health/ready` also
//! proves the database answers queries.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
}

fn healthy() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "attendance-server",
    })
}

async fn live() -> Json<HealthResponse> {
    healthy()
}

async fn ready(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    match sqlx::query("SELECT 1").execute(state.db()).await {
        Ok(_) => Ok(healthy()),
        Err(e) => {
            tracing::error!("Readiness probe failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/live", get(live))
        .route("/ready", get(ready))
}
