//! Health check endpoints
//!
//! - /health, /healthz - Liveness probe (is the process serving?)
//! - /ready, /readyz - Readiness probe (does the database answer?)

use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness probe
pub fn health_check() -> Response<BoxBody> {
    json_response(StatusCode::OK, &HealthResponse { status: "ok" })
}

/// Readiness probe - 200 only if the store answers a ping in time
pub async fn readiness_check(state: &AppState) -> Response<BoxBody> {
    match state.run_store(|store| store.ping()).await {
        Ok(()) => json_response(StatusCode::OK, &HealthResponse { status: "ok" }),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &HealthResponse {
                    status: "unavailable",
                },
            )
        }
    }
}
