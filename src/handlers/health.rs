//! Health check endpoint
//!
//! Liveness plus a summary of the static failover configuration. It never
//! probes the upstream endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub fallback_configured: bool,
    pub max_failover_attempts: u32,
    /// "operational", or "degraded" once any metric failed to record
    pub metrics_status: &'static str,
}

pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let policy = state.controller().policy();
    let metrics_status = if state.metrics().recording_failures_count() > 0 {
        "degraded"
    } else {
        "operational"
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            fallback_configured: policy.fallback().is_some(),
            max_failover_attempts: policy.max_failover_attempts(),
            metrics_status,
        }),
    )
}
