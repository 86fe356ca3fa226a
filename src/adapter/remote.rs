//! HTTP forwarding to a separate model service

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::ml::features::KOI_FEATURES;
use crate::models::{
    CurvePredictRequest, FusePredictRequest, ModelMetrics, PredictionResponse,
    TabularPredictRequest, TrainingJob, TrainingRequest, TrainingResponse,
};
use crate::AppResult;

use super::{AdapterMode, ModelAdapter};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteModelAdapter {
    client: Client,
    base_url: String,
}

impl RemoteModelAdapter {
    pub fn new(base_url: &str) -> AppResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> AppResult<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.client.get(self.url(path)).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[axum::async_trait]
impl ModelAdapter for RemoteModelAdapter {
    fn mode(&self) -> AdapterMode {
        AdapterMode::Remote
    }

    fn feature_names(&self) -> Vec<String> {
        KOI_FEATURES.iter().map(|s| s.to_string()).collect()
    }

    async fn predict_tabular(&self, request: TabularPredictRequest) -> AppResult<PredictionResponse> {
        self.post("/predict/tabular", &request).await
    }

    async fn predict_curve(&self, request: CurvePredictRequest) -> AppResult<PredictionResponse> {
        self.post("/predict/curve", &request).await
    }

    async fn predict_fuse(&self, request: FusePredictRequest) -> AppResult<PredictionResponse> {
        self.post("/predict/fuse", &request).await
    }

    async fn start_training(&self, request: TrainingRequest) -> AppResult<TrainingResponse> {
        self.post("/train", &request).await
    }

    async fn get_job_status(&self, job_id: &str) -> AppResult<TrainingJob> {
        self.get(&format!("/jobs/{}/status", urlencoding::encode(job_id))).await
    }

    async fn get_model_metrics(&self, model_id: &str) -> AppResult<ModelMetrics> {
        self.get(&format!("/models/{}/metrics", urlencoding::encode(model_id))).await
    }
}
