//! Prediction handlers

use axum::{extract::State, Json};

use crate::extract::ValidatedJson;
use crate::models::{CurvePredictRequest, FusePredictRequest, PredictionResponse, TabularPredictRequest};
use crate::{AppResult, AppState};

/// Classify tabular rows
pub async fn tabular(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<TabularPredictRequest>,
) -> AppResult<Json<PredictionResponse>> {
    let rows = req.rows.len();
    let response = state.adapter.predict_tabular(req).await?;
    tracing::debug!("Predicted {} rows", rows);
    Ok(Json(response))
}

pub async fn curve(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CurvePredictRequest>,
) -> AppResult<Json<PredictionResponse>> {
    Ok(Json(state.adapter.predict_curve(req).await?))
}

pub async fn fuse(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<FusePredictRequest>,
) -> AppResult<Json<PredictionResponse>> {
    Ok(Json(state.adapter.predict_fuse(req).await?))
}
