//! Feature list handler

use axum::{extract::State, Json};

use crate::models::FeaturesResponse;
use crate::AppState;

pub async fn list(State(state): State<AppState>) -> Json<FeaturesResponse> {
    Json(FeaturesResponse {
        features: state.adapter.feature_names(),
    })
}
