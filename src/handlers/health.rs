//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::adapter::AdapterMode;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: String,
    model_mode: AdapterMode,
    storage: &'static str,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: state.config.app_version.clone(),
        model_mode: state.adapter.mode(),
        storage: state.datasets.backend().as_str(),
    })
}
