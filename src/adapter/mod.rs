//! Model adapters
//!
//! Handlers talk to a `dyn ModelAdapter`: either the in-process model (with its
//! degraded fallback) or a remote model service reached over HTTP.

pub mod jobs;
pub mod local;
pub mod remote;

use serde::Serialize;

use crate::models::{
    CurvePredictRequest, FusePredictRequest, ModelMetrics, PredictionResponse,
    TabularPredictRequest, TrainingJob, TrainingRequest, TrainingResponse,
};
use crate::AppResult;

pub use jobs::JobRegistry;
pub use local::LocalModelAdapter;
pub use remote::RemoteModelAdapter;

/// What is actually answering prediction requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterMode {
    /// Model loaded from disk
    Local,
    /// Model failed to load; synthetic predictions
    Fallback,
    /// Forwarded to `MODEL_BASE_URL`
    Remote,
}

#[axum::async_trait]
pub trait ModelAdapter: Send + Sync {
    fn mode(&self) -> AdapterMode;

    /// Ordered feature names the model expects
    fn feature_names(&self) -> Vec<String>;

    async fn predict_tabular(&self, request: TabularPredictRequest) -> AppResult<PredictionResponse>;

    async fn predict_curve(&self, request: CurvePredictRequest) -> AppResult<PredictionResponse>;

    async fn predict_fuse(&self, request: FusePredictRequest) -> AppResult<PredictionResponse>;

    async fn start_training(&self, request: TrainingRequest) -> AppResult<TrainingResponse>;

    async fn get_job_status(&self, job_id: &str) -> AppResult<TrainingJob>;

    async fn get_model_metrics(&self, model_id: &str) -> AppResult<ModelMetrics>;
}
