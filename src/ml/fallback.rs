//! Degraded-mode predictor
//!
//! Used when the model directory could not be loaded. Output depends only on the
//! row index, so responses stay deterministic while the real model is unavailable.

use super::{AttributionPair, Explanation, InputRow, Prediction, ProbabilityDistribution, TabularExplanation};

pub const FALLBACK_VERSION: &str = "v1.0.0-fallback";

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPredictor;

impl FallbackPredictor {
    fn positive(index: usize) -> f64 {
        0.3 + (index % 7) as f64 * 0.1
    }

    fn attribution(index: usize) -> Vec<AttributionPair> {
        vec![
            AttributionPair::new("koi_model_snr", 0.3 - (index % 3) as f64 * 0.1),
            AttributionPair::new("koi_duration", 0.2 - (index % 2) as f64 * 0.1),
            AttributionPair::new("koi_depth", 0.15 - (index % 4) as f64 * 0.05),
            AttributionPair::new("koi_period", 0.1 - (index % 3) as f64 * 0.03),
            AttributionPair::new("koi_steff", 0.08 - (index % 2) as f64 * 0.04),
        ]
    }

    pub fn predict(&self, rows: &[InputRow]) -> Vec<Prediction> {
        (0..rows.len())
            .map(|i| {
                let positive = Self::positive(i);
                let negative = 1.0 - positive;
                Prediction {
                    object_id: format!("TARGET-{}", i + 1),
                    probs: ProbabilityDistribution::binary(positive, negative),
                    conf: positive.max(negative),
                    version: FALLBACK_VERSION.to_string(),
                    explain: Some(Explanation {
                        tabular: Some(TabularExplanation { shap: Self::attribution(i) }),
                    }),
                    importance: None,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_probabilities() {
        let rows = vec![InputRow::new(); 9];
        let out = FallbackPredictor.predict(&rows);

        assert_eq!(out.len(), 9);
        assert!((out[0].probs.positive.unwrap() - 0.3).abs() < 1e-9);
        assert!((out[6].probs.positive.unwrap() - 0.9).abs() < 1e-9);
        assert!((out[7].probs.positive.unwrap() - 0.3).abs() < 1e-9);
        assert!((out[0].conf - 0.7).abs() < 1e-9);
        assert_eq!(out[0].object_id, "TARGET-1");
        assert_eq!(out[8].object_id, "TARGET-9");
        assert!(out.iter().all(|p| p.version == FALLBACK_VERSION));
    }

    #[test]
    fn test_object_id_ignores_row_identifiers() {
        let mut named = InputRow::new();
        named.insert("kepoi_name".to_string(), serde_json::json!("K00001.01"));
        named.insert("target_name".to_string(), serde_json::json!("Kepler-22"));

        let out = FallbackPredictor.predict(&[named.clone(), named]);
        assert_eq!(out[0].object_id, "TARGET-1");
        assert_eq!(out[1].object_id, "TARGET-2");
    }

    #[test]
    fn test_fixed_attribution_keyed_by_index() {
        let out = FallbackPredictor.predict(&vec![InputRow::new(); 2]);
        let first = out[0].attribution();
        assert_eq!(first.len(), 5);
        assert_eq!(first[0], AttributionPair::new("koi_model_snr", 0.3));
        let second = out[1].attribution();
        assert!((second[0].weight() - 0.2).abs() < 1e-9);
        assert!((second[4].weight() - 0.04).abs() < 1e-9);
    }
}
