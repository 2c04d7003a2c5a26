use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::now_millis;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: u64,
    pub database: &'static str,
}

/// Liveness plus whether the storage handle is currently established. Does
/// not trigger a connection attempt.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if state.storage.is_connected() {
        "connected"
    } else {
        "disconnected"
    };

    Json(HealthResponse {
        status: "ok",
        timestamp: now_millis(),
        database,
    })
}
