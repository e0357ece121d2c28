//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status: `ok`, or `degraded` when the ledger is unreachable.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Ledger backend in use.
    pub ledger: String,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = match state.engine.ledger().ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check: ledger unreachable");
            "degraded"
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        service: "faucet".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger: state.ledger_name().to_string(),
    })
}
