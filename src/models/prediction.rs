//! Prediction request/response models

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ml::{AttributionPair, AttributionSource, InputRow, Prediction, TabularPredictions};

fn default_threshold() -> f64 {
    0.5
}

fn default_alpha() -> f64 {
    0.7
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TabularPredictRequest {
    pub rows: Vec<InputRow>,
    #[serde(default = "default_threshold")]
    #[validate(range(min = 0.0, max = 1.0, message = "threshold must be within [0, 1]"))]
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CurvePredictRequest {
    #[validate(length(min = 1, message = "curve must not be empty"))]
    pub curve: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Vec<f64>>,
    #[serde(default = "default_threshold")]
    #[validate(range(min = 0.0, max = 1.0, message = "threshold must be within [0, 1]"))]
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FusePredictRequest {
    pub tabular_data: InputRow,
    pub curve_data: Vec<f64>,
    #[serde(default = "default_alpha")]
    #[validate(range(min = 0.0, max = 1.0, message = "alpha must be within [0, 1]"))]
    pub alpha: f64,
    #[serde(default = "default_threshold")]
    #[validate(range(min = 0.0, max = 1.0, message = "threshold must be within [0, 1]"))]
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<Prediction>,
    /// Request-level feature importance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_importance: Vec<AttributionPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_importance_source: Option<AttributionSource>,
}

impl From<TabularPredictions> for PredictionResponse {
    fn from(result: TabularPredictions) -> Self {
        Self {
            predictions: result.predictions,
            global_importance: result.global_importance.pairs,
            global_importance_source: Some(result.global_importance.source),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeaturesResponse {
    pub features: Vec<String>,
}
