//! System endpoints: liveness and the admin status view.

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SystemStatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub database: &'static str,
}

/// GET /health
/// Liveness probe, unauthenticated.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: "maintarr",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /system/status
/// Uptime, version, and a live database ping.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemStatusResponse>, ApiError> {
    let database = match state.store().ping().await {
        Ok(()) => "connected",
        Err(err) => {
            tracing::warn!(error = %err, "Database ping failed");
            "unreachable"
        }
    };

    Ok(Json(SystemStatusResponse {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        database,
    }))
}
