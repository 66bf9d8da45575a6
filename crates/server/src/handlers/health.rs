//! Liveness and readiness.

use crate::emission::EmissionStats;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage_backend: &'static str,
    pub emissions_in_flight: usize,
    pub emissions: EmissionStats,
}

/// GET /health - Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    // Check upload store connectivity
    state.storage.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage_backend: state.storage.backend_name(),
        emissions_in_flight: state.emissions.in_flight().await,
        emissions: state.emissions.stats(),
    }))
}
