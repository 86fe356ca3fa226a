//! Tabular prediction service: the loaded model plus the four pipeline stages

use std::path::Path;

use serde::Serialize;

use super::assembler::PredictionAssembler;
use super::attribution::{Attribution, AttributionEngine, BatchShap};
use super::loader::{self, LoadedModel};
use super::predictor::Predictor;
use super::{FeaturePreparer, InputRow, ModelError, ModelFamily, Prediction, TabularModel};

/// Result of one `predict_tabular` call
#[derive(Debug, Clone, Serialize)]
pub struct TabularPredictions {
    pub predictions: Vec<Prediction>,
    pub global_importance: Attribution,
}

/// Immutable after construction; shared read-only across requests
pub struct ModelService {
    model: Box<dyn TabularModel>,
    preparer: FeaturePreparer,
    predictor: Predictor,
    engine: AttributionEngine,
    assembler: PredictionAssembler,
}

impl ModelService {
    pub fn new(loaded: LoadedModel, version: impl Into<String>, top_k: usize) -> Result<Self, ModelError> {
        let LoadedModel { model, feature_names, scaler } = loaded;
        Ok(Self {
            model,
            preparer: FeaturePreparer::new(feature_names, scaler)?,
            predictor: Predictor,
            engine: AttributionEngine::new(top_k),
            assembler: PredictionAssembler::new(version),
        })
    }

    /// Load `dir` and build the service
    pub fn load(dir: &Path, version: impl Into<String>, top_k: usize) -> Result<Self, ModelError> {
        let loaded = loader::load(dir)?;
        let service = Self::new(loaded, version, top_k)?;

        tracing::info!(
            "Loaded {} model from {} ({} features, scaler: {})",
            service.family().as_str(),
            dir.display(),
            service.feature_names().len(),
            service.preparer.has_scaler()
        );

        Ok(service)
    }

    pub fn feature_names(&self) -> &[String] {
        self.preparer.feature_names()
    }

    pub fn family(&self) -> ModelFamily {
        self.model.family()
    }

    pub fn version(&self) -> &str {
        self.assembler.version()
    }

    pub fn predict_tabular(&self, rows: &[InputRow], threshold: f64) -> Result<TabularPredictions, ModelError> {
        if rows.is_empty() {
            return Ok(TabularPredictions {
                predictions: Vec::new(),
                global_importance: self.engine.global(self.model.as_ref(), self.feature_names(), &BatchShap::Unavailable),
            });
        }

        let features = self.preparer.prepare(rows);
        let row_predictions = self.predictor.predict(self.model.as_ref(), features.view(), threshold)?;

        let batch = self.engine.compute_batch(self.model.as_ref(), features.view());
        let names = self.feature_names();
        let global_importance = self.engine.global(self.model.as_ref(), names, &batch);
        let attributions = (0..rows.len())
            .map(|i| self.engine.per_sample(names, &batch, i))
            .collect::<Vec<_>>();

        if attributions.first().is_some_and(Attribution::is_fallback) {
            tracing::debug!("Per-sample attribution unavailable, using fallback list");
        }

        Ok(TabularPredictions {
            predictions: self.assembler.assemble(rows, row_predictions, attributions),
            global_importance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::attribution::AttributionSource;
    use crate::ml::model::testing::StubModel;
    use crate::ml::ScalerParameters;
    use ndarray::array;
    use serde_json::json;

    fn service(model: StubModel, names: &[&str], scaler: Option<ScalerParameters>) -> ModelService {
        let loaded = LoadedModel {
            model: Box::new(model),
            feature_names: names.iter().map(|s| s.to_string()).collect(),
            scaler,
        };
        ModelService::new(loaded, "v1.0.0", 5).unwrap()
    }

    fn rows(values: serde_json::Value) -> Vec<InputRow> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_binary_scenario_end_to_end() {
        let svc = service(StubModel::binary(0.7), &["koi_period", "koi_depth"], None);
        let out = svc
            .predict_tabular(&rows(json!([{"kepoi_name": "K00752.01", "koi_period": 9.48}])), 0.5)
            .unwrap();

        let p = &out.predictions[0];
        assert_eq!(p.object_id, "K00752.01");
        assert!((p.probs.positive.unwrap() - 0.7).abs() < 1e-9);
        assert!((p.probs.conf.unwrap() - 0.35).abs() < 1e-9);
        assert!((p.conf - 0.7).abs() < 1e-9);
        assert_eq!(p.version, "v1.0.0");
        assert_eq!(p.attribution()[0].name(), "depth_ppm");
        assert_eq!(out.global_importance.source, AttributionSource::Fallback);
    }

    #[test]
    fn test_shap_names_follow_feature_order() {
        let mut model = StubModel::binary(0.6);
        model.shap = Some(Ok(vec![array![[0.1, -0.5], [0.4, 0.0]]]));
        let svc = service(model, &["a", "b"], None);

        let out = svc.predict_tabular(&rows(json!([{}, {}])), 0.5).unwrap();
        assert_eq!(out.predictions[0].attribution()[0].name(), "b");
        assert_eq!(out.predictions[1].attribution()[0].name(), "a");
        assert_eq!(out.global_importance.source, AttributionSource::Shap);
    }

    #[test]
    fn test_empty_request() {
        let svc = service(StubModel::binary(0.5), &["a"], None);
        let out = svc.predict_tabular(&[], 0.5).unwrap();
        assert!(out.predictions.is_empty());
    }

    #[test]
    fn test_inference_error_surfaces() {
        let mut model = StubModel::binary(0.5);
        model.fail_inference = true;
        let svc = service(model, &["a"], None);
        assert!(svc.predict_tabular(&rows(json!([{}])), 0.5).is_err());
    }

    #[test]
    fn test_scaler_length_checked_on_construction() {
        let loaded = LoadedModel {
            model: Box::new(StubModel::binary(0.5)),
            feature_names: vec!["a".to_string(), "b".to_string()],
            scaler: Some(ScalerParameters::new(vec![0.0], vec![1.0]).unwrap()),
        };
        assert!(ModelService::new(loaded, "v", 5).is_err());
    }
}
