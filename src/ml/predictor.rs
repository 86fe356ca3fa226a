//! Predictor
//!
//! Raw model scores → canonical 2- or 3-column distribution → per-row
//! [`ProbabilityDistribution`] and confidence.

use ndarray::{s, Array2, ArrayView1, ArrayView2};

use super::model::{RawScores, ScoreLayout, TabularModel};
use super::{ModelError, ProbabilityDistribution};

/// Multi-class models are cut or zero-padded to CONF / PC / FP
pub const MULTI_CLASS_WIDTH: usize = 3;

/// Tolerance for "sums to one"
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Distribution and confidence for one row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowPrediction {
    pub probs: ProbabilityDistribution,
    /// Largest canonical class probability, taken before threshold remapping
    pub confidence: f64,
}

/// Reshape raw scores to width 2 (binary) or exactly [`MULTI_CLASS_WIDTH`].
///
/// A binary model emitting one positive-class column `p` becomes `[p, 1 - p]`.
pub fn canonicalize(raw: RawScores) -> Result<Array2<f64>, ModelError> {
    let (rows, cols) = raw.values.dim();
    if cols == 0 {
        return Err(ModelError::Inference("model returned no score columns".to_string()));
    }

    match raw.layout {
        ScoreLayout::Binary if cols == 1 => {
            Ok(Array2::from_shape_fn((rows, 2), |(i, j)| {
                let p = raw.values[[i, 0]];
                if j == 0 {
                    p
                } else {
                    1.0 - p
                }
            }))
        }
        ScoreLayout::Binary if cols == 2 => Ok(raw.values),
        ScoreLayout::Binary => Err(ModelError::Inference(format!(
            "binary model returned {} score columns",
            cols
        ))),
        ScoreLayout::MultiClass => {
            let mut out = Array2::zeros((rows, MULTI_CLASS_WIDTH));
            let keep = cols.min(MULTI_CLASS_WIDTH);
            out.slice_mut(s![.., ..keep])
                .assign(&raw.values.slice(s![.., ..keep]));
            Ok(out)
        }
    }
}

/// Divide every row by its sum. A row that sums to zero (or is not finite)
/// becomes uniform.
pub fn normalize_rows(matrix: &mut Array2<f64>) {
    let width = matrix.ncols() as f64;
    for mut row in matrix.rows_mut() {
        let total: f64 = row.sum();
        if total > 0.0 && total.is_finite() {
            row /= total;
        } else {
            row.fill(1.0 / width);
        }
    }
}

/// Threshold remapping for a `[positive, negative]` row.
///
/// The arithmetic is kept exactly as deployed: both weighting factors cancel, so
/// `POSITIVE`/`NEGATIVE` only pass through the renormalization, and
/// `CONF + PC + FP` sums to `POSITIVE` rather than 1.
pub fn remap_binary(positive: f64, negative: f64, threshold: f64) -> ProbabilityDistribution {
    let t = threshold;

    let mut adjusted_positive = positive * (1.0 + t) / (1.0 + t);
    let mut adjusted_negative = negative * (1.0 + (1.0 - t)) / (2.0 - t);

    let total = adjusted_positive + adjusted_negative;
    if total > 0.0 {
        adjusted_positive /= total;
        adjusted_negative /= total;
    }

    // The deployed model splits identically above and below t = 0.5.
    let conf_prob = adjusted_positive * t;
    let pc_prob = adjusted_positive * (1.0 - t);

    ProbabilityDistribution {
        positive: Some(adjusted_positive),
        negative: Some(adjusted_negative),
        conf: Some(conf_prob),
        pc: Some(pc_prob),
        fp: Some(0.0),
    }
}

/// Distribution for one canonical row
pub fn distribution_for(row: ArrayView1<'_, f64>, threshold: f64) -> ProbabilityDistribution {
    if row.len() == 2 {
        remap_binary(row[0], row[1], threshold)
    } else {
        ProbabilityDistribution::multi_class(
            row[0],
            row[1],
            row.get(2).copied().unwrap_or(0.0),
        )
    }
}

fn row_max(row: ArrayView1<'_, f64>) -> f64 {
    row.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Stateless; kept as a type so the service composes its stages uniformly
#[derive(Debug, Clone, Copy, Default)]
pub struct Predictor;

impl Predictor {
    /// Canonical rows after padding and normalization, before remapping
    pub fn canonical_probabilities(
        &self,
        model: &dyn TabularModel,
        features: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, ModelError> {
        let raw = model.infer(features)?;
        if raw.values.nrows() != features.nrows() {
            return Err(ModelError::Inference(format!(
                "model returned {} rows for {} inputs",
                raw.values.nrows(),
                features.nrows()
            )));
        }

        let mut canonical = canonicalize(raw)?;
        normalize_rows(&mut canonical);
        Ok(canonical)
    }

    /// Inference errors propagate; nothing is substituted here.
    pub fn predict(
        &self,
        model: &dyn TabularModel,
        features: ArrayView2<'_, f64>,
        threshold: f64,
    ) -> Result<Vec<RowPrediction>, ModelError> {
        let canonical = self.canonical_probabilities(model, features)?;

        Ok(canonical
            .rows()
            .into_iter()
            .map(|row| RowPrediction {
                probs: distribution_for(row, threshold),
                confidence: row_max(row),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::testing::StubModel;
    use ndarray::array;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < PROBABILITY_TOLERANCE
    }

    #[test]
    fn test_binary_single_column_expands() {
        let canonical = canonicalize(RawScores::binary(array![[0.8], [0.25]])).unwrap();
        let expected = array![[0.8, 0.2], [0.25, 0.75]];
        assert_eq!(canonical.dim(), expected.dim());
        for (a, b) in canonical.iter().zip(expected.iter()) {
            assert!(close(*a, *b), "{} != {}", a, b);
        }
    }

    #[test]
    fn test_multi_class_pads_missing_column() {
        let canonical = canonicalize(RawScores::multi_class(array![[0.6, 0.4]])).unwrap();
        assert_eq!(canonical, array![[0.6, 0.4, 0.0]]);
    }

    #[test]
    fn test_multi_class_truncates_extra_columns() {
        let canonical =
            canonicalize(RawScores::multi_class(array![[0.1, 0.2, 0.3, 0.4]])).unwrap();
        assert_eq!(canonical, array![[0.1, 0.2, 0.3]]);
    }

    #[test]
    fn test_binary_with_three_columns_rejected() {
        assert!(canonicalize(RawScores::binary(array![[0.1, 0.2, 0.7]])).is_err());
    }

    #[test]
    fn test_rows_sum_to_one() {
        let mut m = array![[0.1, 0.2, 0.3], [2.0, 1.0, 1.0], [0.0, 0.0, 0.0]];
        normalize_rows(&mut m);
        for row in m.rows() {
            assert!(close(row.sum(), 1.0));
        }
        assert!(close(m[[2, 0]], 1.0 / 3.0));
    }

    #[test]
    fn test_remap_identity_at_half() {
        let probs = remap_binary(0.7, 0.3, 0.5);
        assert!(close(probs.positive.unwrap(), 0.7));
        assert!(close(probs.negative.unwrap(), 0.3));
        assert!(close(probs.conf.unwrap(), 0.35));
        assert!(close(probs.pc.unwrap(), 0.35));
        assert_eq!(probs.fp, Some(0.0));
    }

    #[test]
    fn test_remap_conf_pc_sum_to_positive() {
        for &t in &[0.0, 0.2, 0.5, 0.8, 1.0] {
            let probs = remap_binary(0.64, 0.36, t);
            let positive = probs.positive.unwrap();
            let negative = probs.negative.unwrap();
            assert!(close(positive + negative, 1.0));
            assert!(close(probs.conf.unwrap() + probs.pc.unwrap() + probs.fp.unwrap(), positive));
            assert!(probs.values().all(|v| v >= 0.0));
        }
    }

    #[test]
    fn test_confidence_is_canonical_max() {
        let model = StubModel::binary(0.3);
        let features = Array2::<f64>::zeros((2, 1));
        for &t in &[0.1, 0.5, 0.9] {
            let out = Predictor.predict(&model, features.view(), t).unwrap();
            assert_eq!(out.len(), 2);
            for row in &out {
                assert!(close(row.confidence, 0.7));
            }
        }
    }

    #[test]
    fn test_multi_class_distribution() {
        let model = StubModel::multi_class(vec![2.0, 1.0, 1.0]);
        let features = Array2::<f64>::zeros((1, 1));
        let out = Predictor.predict(&model, features.view(), 0.9).unwrap();
        let probs = out[0].probs;
        assert!(probs.positive.is_none());
        assert!(close(probs.conf.unwrap(), 0.5));
        assert!(close(probs.pc.unwrap(), 0.25));
        assert!(close(probs.fp.unwrap(), 0.25));
        assert!(close(out[0].confidence, 0.5));
    }

    #[test]
    fn test_inference_failure_propagates() {
        let mut model = StubModel::binary(0.5);
        model.fail_inference = true;
        let features = Array2::<f64>::zeros((1, 1));
        assert!(Predictor.predict(&model, features.view(), 0.5).is_err());
    }
}
