//! Native LightGBM adapter
//!
//! Reads the text model written by `Booster.save_model`, evaluates trees directly,
//! exposes split-gain importance and an exact TreeSHAP explainer.

mod parser;
mod shap;
mod tree;

use ndarray::{Array2, ArrayView2};

use self::parser::{Header, Objective};
use self::tree::Tree;
use super::model::{Explainer, ModelFamily, RawScores, TabularModel};
use super::ModelError;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax_in_place(row: &mut [f64]) {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut total = 0.0;
    for v in row.iter_mut() {
        *v = (*v - max).exp();
        total += *v;
    }
    for v in row.iter_mut() {
        *v /= total;
    }
}

#[derive(Debug, Clone)]
pub struct LightGbmModel {
    header: Header,
    trees: Vec<Tree>,
    feature_names: Vec<String>,
    explainable: bool,
}

impl LightGbmModel {
    pub fn from_text(text: &str) -> Result<Self, ModelError> {
        let parser::ParsedModel { header, trees } = parser::parse(text)?;
        if header.num_class > 1 && header.num_class != header.num_tree_per_iteration {
            return Err(ModelError::Parse(format!(
                "num_class={} but num_tree_per_iteration={}",
                header.num_class, header.num_tree_per_iteration
            )));
        }
        if header.objective == Objective::Identity {
            return Err(ModelError::UnsupportedFormat(
                "LightGBM objective does not produce class probabilities".to_string(),
            ));
        }
        let explainable = trees.iter().all(Tree::has_counts);
        if !explainable {
            tracing::warn!("LightGBM model has no node counts, per-sample attribution disabled");
        }

        Ok(Self {
            feature_names: header.feature_names.clone(),
            header,
            trees,
            explainable,
        })
    }

    pub fn num_features(&self) -> usize {
        self.header.max_feature_idx + 1
    }

    /// Output columns: one per tree in an iteration
    pub fn num_outputs(&self) -> usize {
        self.header.num_tree_per_iteration
    }

    fn iterations(&self) -> f64 {
        (self.trees.len() / self.num_outputs()).max(1) as f64
    }

    fn check_width(&self, features: &ArrayView2<'_, f64>) -> Result<(), ModelError> {
        if features.ncols() != self.num_features() {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.num_features(),
                actual: features.ncols(),
            });
        }
        Ok(())
    }

    /// Untransformed margins, `rows × num_outputs`
    pub fn raw_scores(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        self.check_width(&features)?;

        let k = self.num_outputs();
        let mut raw = Array2::<f64>::zeros((features.nrows(), k));
        for (row, mut out) in features.rows().into_iter().zip(raw.rows_mut()) {
            for (t, tree) in self.trees.iter().enumerate() {
                out[t % k] += tree.predict(row);
            }
        }

        if self.header.average_output {
            raw /= self.iterations();
        }
        Ok(raw)
    }

    /// Raw-score baseline per output: the mean model output over the training data
    pub fn expected_value(&self) -> Vec<f64> {
        let k = self.num_outputs();
        let mut base = vec![0.0; k];
        for (t, tree) in self.trees.iter().enumerate() {
            base[t % k] += tree.expected_value();
        }
        if self.header.average_output {
            let n = self.iterations();
            base.iter_mut().for_each(|v| *v /= n);
        }
        base
    }
}

impl TabularModel for LightGbmModel {
    fn family(&self) -> ModelFamily {
        ModelFamily::LightGbm
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn infer(&self, features: ArrayView2<'_, f64>) -> Result<RawScores, ModelError> {
        let mut scores = self.raw_scores(features)?;

        match self.header.objective {
            Objective::Binary { sigmoid: k } => {
                scores.mapv_inplace(|v| sigmoid(k * v));
                Ok(RawScores::binary(scores))
            }
            Objective::Softmax => {
                for mut row in scores.rows_mut() {
                    if let Some(slice) = row.as_slice_mut() {
                        softmax_in_place(slice);
                    }
                }
                Ok(RawScores::multi_class(scores))
            }
            Objective::OneVsAll { sigmoid: k } => {
                scores.mapv_inplace(|v| sigmoid(k * v));
                Ok(RawScores::multi_class(scores))
            }
            Objective::Identity => Err(ModelError::Inference(
                "objective has no probability transform".to_string(),
            )),
        }
    }

    /// Total split gain per feature
    fn feature_importance(&self) -> Option<Vec<(String, f64)>> {
        let mut gain = vec![0.0; self.num_features()];
        for tree in &self.trees {
            for (&f, &g) in tree.split_feature.iter().zip(tree.split_gain.iter()) {
                gain[f] += g;
            }
        }

        Some(
            gain.into_iter()
                .enumerate()
                .map(|(i, g)| {
                    let name = self
                        .feature_names
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("Column_{}", i));
                    (name, g)
                })
                .collect(),
        )
    }

    fn explainer(&self) -> Option<&dyn Explainer> {
        if self.explainable {
            Some(self)
        } else {
            None
        }
    }
}

impl Explainer for LightGbmModel {
    fn shap_values(&self, features: ArrayView2<'_, f64>) -> Result<Vec<Array2<f64>>, ModelError> {
        self.check_width(&features)?;

        let k = self.num_outputs();
        let n = self.num_features();
        let scale = if self.header.average_output { self.iterations() } else { 1.0 };
        let mut per_class = vec![Array2::<f64>::zeros((features.nrows(), n)); k];

        for (r, row) in features.rows().into_iter().enumerate() {
            for (t, tree) in self.trees.iter().enumerate() {
                let mut out = per_class[t % k].row_mut(r);
                let phi = out
                    .as_slice_mut()
                    .ok_or_else(|| ModelError::Attribution("non-contiguous output".to_string()))?;
                shap::tree_shap(tree, row, phi);
            }
        }

        for values in per_class.iter_mut() {
            if scale != 1.0 {
                *values /= scale;
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::Attribution("non-finite SHAP value".to_string()));
            }
        }

        Ok(per_class)
    }
}
