//! Feedback handler

use axum::{extract::State, Json};

use crate::extract::ValidatedJson;
use crate::models::{FeedbackRequest, FeedbackResponse};
use crate::{AppResult, AppState};

pub async fn submit(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<FeedbackRequest>,
) -> AppResult<Json<FeedbackResponse>> {
    let feedback_id = state.feedback.save(&req).await?;
    Ok(Json(FeedbackResponse {
        success: true,
        message: Some(format!("Feedback saved ({})", feedback_id)),
    }))
}
