//! Prediction Assembler

use serde_json::Value;

use super::attribution::Attribution;
use super::features::InputRow;
use super::predictor::RowPrediction;
use super::{Explanation, Prediction, TabularExplanation};

/// Row fields that may carry an identifier, highest precedence first
pub const OBJECT_ID_FIELDS: [&str; 3] = ["target_name", "object_id", "kepoi_name"];

fn label_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Identifier for row `index` (0-based): the first non-empty id field, else `TARGET-{index + 1}`
pub fn resolve_object_id(row: &InputRow, index: usize) -> String {
    OBJECT_ID_FIELDS
        .iter()
        .find_map(|field| row.get(*field).and_then(label_of))
        .unwrap_or_else(|| format!("TARGET-{}", index + 1))
}

#[derive(Debug, Clone)]
pub struct PredictionAssembler {
    version: String,
}

impl PredictionAssembler {
    pub fn new(version: impl Into<String>) -> Self {
        Self { version: version.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Zip rows, predictions and per-row attribution. All three must have the same length.
    pub fn assemble(
        &self,
        rows: &[InputRow],
        predictions: Vec<RowPrediction>,
        attributions: Vec<Attribution>,
    ) -> Vec<Prediction> {
        rows.iter()
            .zip(predictions)
            .zip(attributions)
            .enumerate()
            .map(|(i, ((row, prediction), attribution))| Prediction {
                object_id: resolve_object_id(row, i),
                probs: prediction.probs,
                conf: prediction.confidence,
                version: self.version.clone(),
                explain: Some(Explanation {
                    tabular: Some(TabularExplanation { shap: attribution.pairs }),
                }),
                importance: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ProbabilityDistribution;
    use serde_json::json;

    fn row(value: Value) -> InputRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_object_id_precedence() {
        let all = row(json!({"target_name": "Kepler-22", "object_id": "obj-1", "kepoi_name": "K00087.01"}));
        assert_eq!(resolve_object_id(&all, 0), "Kepler-22");

        let no_target = row(json!({"object_id": "obj-1", "kepoi_name": "K00087.01"}));
        assert_eq!(resolve_object_id(&no_target, 0), "obj-1");

        let koi_only = row(json!({"kepoi_name": "K00087.01", "koi_period": 289.9}));
        assert_eq!(resolve_object_id(&koi_only, 0), "K00087.01");

        let nothing = row(json!({"koi_period": 289.9}));
        assert_eq!(resolve_object_id(&nothing, 4), "TARGET-5");
    }

    #[test]
    fn test_empty_and_null_ids_skipped() {
        let r = row(json!({"target_name": "", "object_id": null, "kepoi_name": "K00001.01"}));
        assert_eq!(resolve_object_id(&r, 0), "K00001.01");

        let numeric = row(json!({"object_id": 10797460}));
        assert_eq!(resolve_object_id(&numeric, 0), "10797460");
    }

    #[test]
    fn test_assemble_preserves_order() {
        let assembler = PredictionAssembler::new("v1.0.0");
        let rows = vec![row(json!({"object_id": "a"})), row(json!({}))];
        let preds = vec![
            RowPrediction {
                probs: ProbabilityDistribution::multi_class(0.6, 0.3, 0.1),
                confidence: 0.6,
            },
            RowPrediction {
                probs: ProbabilityDistribution::multi_class(0.2, 0.7, 0.1),
                confidence: 0.7,
            },
        ];
        let attrs = vec![Attribution::sample_fallback(5), Attribution::sample_fallback(2)];

        let out = assembler.assemble(&rows, preds, attrs);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].object_id, "a");
        assert_eq!(out[1].object_id, "TARGET-2");
        assert_eq!(out[1].conf, 0.7);
        assert_eq!(out[0].version, "v1.0.0");
        assert_eq!(out[0].attribution().len(), 5);
        assert_eq!(out[1].attribution().len(), 2);
    }
}
