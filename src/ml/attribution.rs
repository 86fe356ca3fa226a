//! Attribution Engine
//!
//! Global importance and per-sample contributions, each resolved through a fixed
//! chain of sources. Every failure degrades to a fixed list; callers can tell which
//! source produced a result from [`Attribution::source`].

use std::cmp::Ordering;

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::model::TabularModel;
use super::{AttributionPair, DEFAULT_TOP_K};

/// Global importance used when no model-backed source is available
pub const GLOBAL_FALLBACK: [(&str, f64); 5] = [
    ("depth_ppm", 0.31),
    ("snr", 0.22),
    ("period", 0.17),
    ("duration_hr", 0.12),
    ("teff", 0.08),
];

/// Per-sample attribution used when no explainer is available
pub const SAMPLE_FALLBACK: [(&str, f64); 5] = [
    ("depth_ppm", 0.15),
    ("snr", -0.08),
    ("period", 0.12),
    ("duration_hr", -0.05),
    ("teff", 0.03),
];

/// Where an attribution list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionSource {
    NativeImportance,
    Shap,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub pairs: Vec<AttributionPair>,
    pub source: AttributionSource,
}

impl Attribution {
    fn fallback(list: &[(&str, f64)], top_k: usize) -> Self {
        Self {
            pairs: list
                .iter()
                .take(top_k)
                .map(|&(name, weight)| AttributionPair::new(name, weight))
                .collect(),
            source: AttributionSource::Fallback,
        }
    }

    pub fn global_fallback(top_k: usize) -> Self {
        Self::fallback(&GLOBAL_FALLBACK, top_k)
    }

    pub fn sample_fallback(top_k: usize) -> Self {
        Self::fallback(&SAMPLE_FALLBACK, top_k)
    }

    pub fn is_fallback(&self) -> bool {
        self.source == AttributionSource::Fallback
    }
}

/// SHAP values for a whole request, computed once and sliced per row
#[derive(Debug, Clone)]
pub enum BatchShap {
    /// The model has no explainer
    Unavailable,
    /// The explainer ran and failed
    Failed(String),
    /// First-class attribution, `rows × features`
    Values(Array2<f64>),
}

/// Names for `width` attribution columns
fn column_names(names: &[String], width: usize) -> Vec<String> {
    if names.len() == width {
        names.to_vec()
    } else {
        (0..width).map(|i| format!("feature_{}", i)).collect()
    }
}

/// Sort by `key` descending and keep the first `top_k`
fn rank_top_k(mut pairs: Vec<AttributionPair>, top_k: usize, key: impl Fn(f64) -> f64) -> Vec<AttributionPair> {
    pairs.sort_by(|a, b| key(b.1).partial_cmp(&key(a.1)).unwrap_or(Ordering::Equal));
    pairs.truncate(top_k);
    pairs
}

#[derive(Debug, Clone, Copy)]
pub struct AttributionEngine {
    top_k: usize,
}

impl Default for AttributionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl AttributionEngine {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Run the model's explainer over the batch. Multi-class explainers return one
    /// matrix per class; only the first is kept.
    pub fn compute_batch(&self, model: &dyn TabularModel, features: ArrayView2<'_, f64>) -> BatchShap {
        let Some(explainer) = model.explainer() else {
            return BatchShap::Unavailable;
        };

        match explainer.shap_values(features) {
            Ok(per_class) => match per_class.into_iter().next() {
                Some(values) if values.dim() == features.dim() => BatchShap::Values(values),
                Some(values) => BatchShap::Failed(format!(
                    "explainer returned shape {:?} for input {:?}",
                    values.dim(),
                    features.dim()
                )),
                None => BatchShap::Failed("explainer returned no classes".to_string()),
            },
            Err(e) => {
                tracing::warn!("SHAP computation failed, using fallback attribution: {}", e);
                BatchShap::Failed(e.to_string())
            }
        }
    }

    /// Native importance → mean |SHAP| over the batch → fixed list
    pub fn global(&self, model: &dyn TabularModel, names: &[String], batch: &BatchShap) -> Attribution {
        if let Some(importance) = model.feature_importance().filter(|v| !v.is_empty()) {
            let pairs = importance
                .into_iter()
                .map(|(name, score)| AttributionPair::new(name, score))
                .collect();
            return Attribution {
                pairs: rank_top_k(pairs, self.top_k, |v| v),
                source: AttributionSource::NativeImportance,
            };
        }

        if let BatchShap::Values(values) = batch {
            if values.nrows() > 0 {
                if let Some(mean_abs) = values.mapv(f64::abs).mean_axis(Axis(0)) {
                    let pairs = column_names(names, mean_abs.len())
                        .into_iter()
                        .zip(mean_abs.iter())
                        .map(|(name, &score)| AttributionPair::new(name, score))
                        .collect();
                    return Attribution {
                        pairs: rank_top_k(pairs, self.top_k, |v| v),
                        source: AttributionSource::Shap,
                    };
                }
            }
        }

        Attribution::global_fallback(self.top_k)
    }

    /// Signed SHAP for one row ranked by magnitude → fixed list
    pub fn per_sample(&self, names: &[String], batch: &BatchShap, row: usize) -> Attribution {
        match batch {
            BatchShap::Values(values) if row < values.nrows() => {
                let sample = values.row(row);
                let pairs = column_names(names, sample.len())
                    .into_iter()
                    .zip(sample.iter())
                    .map(|(name, &weight)| AttributionPair::new(name, weight))
                    .collect();
                Attribution {
                    pairs: rank_top_k(pairs, self.top_k, f64::abs),
                    source: AttributionSource::Shap,
                }
            }
            _ => Attribution::sample_fallback(self.top_k),
        }
    }
}
