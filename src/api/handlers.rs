use crate::api::AppState;
use crate::error::{AppError, Result};
use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        domains: state.schema.query_fields.keys().cloned().collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Root query fields served by the composed schema
    pub domains: Vec<String>,
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    if !state.metrics_enabled {
        return Err(AppError::NotFound("metrics are disabled".to_string()));
    }
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::gather_metrics(),
    ))
}
