//! Training job and model metrics handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::extract::ValidatedJson;
use crate::models::{ModelMetrics, TrainingJob, TrainingRequest, TrainingResponse};
use crate::{AppResult, AppState};

/// Start a training job
pub async fn start(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<TrainingRequest>,
) -> AppResult<Json<TrainingResponse>> {
    let response = state.adapter.start_training(req).await?;
    Ok(Json(response))
}

/// Job progress
pub async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<TrainingJob>> {
    let job = state.adapter.get_job_status(&job_id).await?;
    Ok(Json(job))
}

/// Evaluation metrics of a model version
pub async fn metrics(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> AppResult<Json<ModelMetrics>> {
    let metrics = state.adapter.get_model_metrics(&model_id).await?;
    Ok(Json(metrics))
}
