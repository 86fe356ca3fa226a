//! In-process model adapter

use std::sync::Arc;

use crate::config::Config;
use crate::ml::features::KOI_FEATURES;
use crate::ml::{Attribution, FallbackPredictor, ModelService};
use crate::models::{
    CurvePredictRequest, FusePredictRequest, ModelMetrics, PredictionResponse,
    TabularPredictRequest, TrainingJob, TrainingRequest, TrainingResponse,
};
use crate::{AppError, AppResult};

use super::jobs::{self, JobRegistry};
use super::{AdapterMode, ModelAdapter};

enum Engine {
    Loaded(Arc<ModelService>),
    Fallback(FallbackPredictor),
}

pub struct LocalModelAdapter {
    engine: Engine,
    jobs: JobRegistry,
    model_version: String,
    top_k: usize,
}

impl LocalModelAdapter {
    pub fn new(service: ModelService, config: &Config) -> Self {
        Self::with_engine(Engine::Loaded(Arc::new(service)), config)
    }

    /// Degraded mode: synthetic predictions only
    pub fn fallback(config: &Config) -> Self {
        Self::with_engine(Engine::Fallback(FallbackPredictor), config)
    }

    /// Load `MODEL_PATH`; on any load error log it and serve the fallback
    pub fn load(config: &Config) -> Self {
        match ModelService::load(&config.model_path, &config.model_version, config.attribution_top_k) {
            Ok(service) => Self::new(service, config),
            Err(e) => {
                tracing::warn!(
                    "Model could not be loaded from {}: {}. Serving fallback predictions",
                    config.model_path.display(),
                    e
                );
                Self::fallback(config)
            }
        }
    }

    fn with_engine(engine: Engine, config: &Config) -> Self {
        Self {
            engine,
            jobs: JobRegistry::new(config.training_duration_secs),
            model_version: config.model_version.clone(),
            top_k: config.attribution_top_k,
        }
    }
}

#[axum::async_trait]
impl ModelAdapter for LocalModelAdapter {
    fn mode(&self) -> AdapterMode {
        match self.engine {
            Engine::Loaded(_) => AdapterMode::Local,
            Engine::Fallback(_) => AdapterMode::Fallback,
        }
    }

    fn feature_names(&self) -> Vec<String> {
        match &self.engine {
            Engine::Loaded(service) => service.feature_names().to_vec(),
            Engine::Fallback(_) => KOI_FEATURES.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn predict_tabular(&self, request: TabularPredictRequest) -> AppResult<PredictionResponse> {
        let TabularPredictRequest { rows, threshold } = request;

        match &self.engine {
            Engine::Loaded(service) => {
                let service = Arc::clone(service);
                let result =
                    tokio::task::spawn_blocking(move || service.predict_tabular(&rows, threshold)).await??;
                Ok(result.into())
            }
            Engine::Fallback(predictor) => {
                let global = Attribution::global_fallback(self.top_k);
                Ok(PredictionResponse {
                    predictions: predictor.predict(&rows),
                    global_importance: global.pairs,
                    global_importance_source: Some(global.source),
                })
            }
        }
    }

    async fn predict_curve(&self, _request: CurvePredictRequest) -> AppResult<PredictionResponse> {
        Err(AppError::NotImplemented(
            "Light-curve prediction is not available in local mode".to_string(),
        ))
    }

    async fn predict_fuse(&self, _request: FusePredictRequest) -> AppResult<PredictionResponse> {
        Err(AppError::NotImplemented(
            "Fused prediction is not available in local mode".to_string(),
        ))
    }

    async fn start_training(&self, request: TrainingRequest) -> AppResult<TrainingResponse> {
        let job_id = self.jobs.start(&request.dataset_id);
        Ok(TrainingResponse { job_id })
    }

    async fn get_job_status(&self, job_id: &str) -> AppResult<TrainingJob> {
        self.jobs
            .status(job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job not found: {}", job_id)))
    }

    async fn get_model_metrics(&self, model_id: &str) -> AppResult<ModelMetrics> {
        if model_id == "latest" || model_id == self.model_version {
            Ok(jobs::model_metrics())
        } else {
            Err(AppError::NotFound(format!("Model not found: {}", model_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::fallback::FALLBACK_VERSION;
    use crate::ml::lightgbm::tests::STUMP_MODEL;
    use crate::ml::AttributionSource;
    use crate::models::JobStatus;
    use serde_json::json;

    fn rows(values: &[serde_json::Value]) -> Vec<crate::ml::InputRow> {
        values
            .iter()
            .map(|v| v.as_object().cloned().unwrap_or_default())
            .collect()
    }

    fn loaded_adapter() -> (tempfile::TempDir, LocalModelAdapter) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("best_model.txt"), STUMP_MODEL).unwrap();
        let config = Config {
            model_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        let adapter = LocalModelAdapter::load(&config);
        (dir, adapter)
    }

    #[tokio::test]
    async fn test_load_failure_enters_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            model_path: dir.path().join("missing"),
            ..Config::default()
        };
        let adapter = LocalModelAdapter::load(&config);
        assert_eq!(adapter.mode(), AdapterMode::Fallback);
        assert_eq!(adapter.feature_names().len(), KOI_FEATURES.len());

        let response = adapter
            .predict_tabular(TabularPredictRequest {
                rows: rows(&[json!({}), json!({"kepoi_name": "K00001.01"})]),
                threshold: 0.5,
            })
            .await
            .unwrap();
        assert_eq!(response.predictions.len(), 2);
        assert_eq!(response.predictions[0].object_id, "TARGET-1");
        assert_eq!(response.predictions[1].object_id, "TARGET-2");
        assert_eq!(response.predictions[0].version, FALLBACK_VERSION);
        assert_eq!(response.global_importance_source, Some(AttributionSource::Fallback));
    }

    #[tokio::test]
    async fn test_loaded_model_predicts() {
        let (_dir, adapter) = loaded_adapter();
        assert_eq!(adapter.mode(), AdapterMode::Local);
        assert_eq!(adapter.feature_names(), vec!["period".to_string(), "depth".to_string()]);

        let response = adapter
            .predict_tabular(TabularPredictRequest {
                rows: rows(&[json!({"period": 0.0, "target_name": "low"}), json!({"period": 2.0})]),
                threshold: 0.5,
            })
            .await
            .unwrap();

        let low = response.predictions[0].probs.positive.unwrap();
        let high = response.predictions[1].probs.positive.unwrap();
        assert!(low < 0.5 && high > 0.5);
        assert_eq!(response.predictions[0].object_id, "low");
        assert_eq!(response.predictions[0].version, "v1.0.0");
        assert_eq!(response.global_importance_source, Some(AttributionSource::NativeImportance));
    }

    #[tokio::test]
    async fn test_curve_and_fuse_not_implemented() {
        let adapter = LocalModelAdapter::fallback(&Config::default());
        let curve = CurvePredictRequest {
            curve: vec![1.0, 0.99],
            time: None,
            threshold: 0.5,
        };
        assert!(matches!(adapter.predict_curve(curve).await, Err(AppError::NotImplemented(_))));

        let fuse = FusePredictRequest {
            tabular_data: Default::default(),
            curve_data: vec![1.0],
            alpha: 0.7,
            threshold: 0.5,
        };
        assert!(matches!(adapter.predict_fuse(fuse).await, Err(AppError::NotImplemented(_))));
    }

    #[tokio::test]
    async fn test_training_and_metrics() {
        let adapter = LocalModelAdapter::fallback(&Config::default());
        let started = adapter
            .start_training(TrainingRequest {
                dataset_id: "abc".to_string(),
                config: Default::default(),
            })
            .await
            .unwrap();

        let job = adapter.get_job_status(&started.job_id).await.unwrap();
        assert!(matches!(job.status, JobStatus::Pending | JobStatus::Running));
        assert!(matches!(adapter.get_job_status("nope").await, Err(AppError::NotFound(_))));

        assert!(adapter.get_model_metrics("latest").await.is_ok());
        assert!(adapter.get_model_metrics("v1.0.0").await.is_ok());
        assert!(matches!(adapter.get_model_metrics("v9").await, Err(AppError::NotFound(_))));
    }
}
