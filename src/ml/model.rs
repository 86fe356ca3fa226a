//! Model capability interface
//!
//! The pipeline never branches on the concrete model library. Each model family
//! implements [`TabularModel`]; optional capabilities (native importance, per-sample
//! attribution) are advertised through default-`None` methods.

use ndarray::{Array2, ArrayView2};
use serde::Serialize;

use super::ModelError;

/// Concrete model family behind a [`TabularModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LightGbm,
    Onnx,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LightGbm => "lightgbm",
            Self::Onnx => "onnx",
        }
    }
}

/// How the columns of a raw score matrix are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreLayout {
    /// One positive-class probability per row, or `[positive, negative]` pairs
    Binary,
    /// One probability per class
    MultiClass,
}

/// Raw class scores, one row per input row
#[derive(Debug, Clone, PartialEq)]
pub struct RawScores {
    pub layout: ScoreLayout,
    pub values: Array2<f64>,
}

impl RawScores {
    pub fn binary(values: Array2<f64>) -> Self {
        Self { layout: ScoreLayout::Binary, values }
    }

    pub fn multi_class(values: Array2<f64>) -> Self {
        Self { layout: ScoreLayout::MultiClass, values }
    }
}

/// Per-sample feature attribution (SHAP-style)
pub trait Explainer: Send + Sync {
    /// Signed attribution per row and feature; one matrix per output class.
    fn shap_values(&self, features: ArrayView2<'_, f64>) -> Result<Vec<Array2<f64>>, ModelError>;
}

/// A loaded, immutable classifier safe for concurrent read-only inference
pub trait TabularModel: Send + Sync {
    fn family(&self) -> ModelFamily;

    /// Feature names embedded in the artifact; empty when the format carries none
    fn feature_names(&self) -> &[String];

    fn infer(&self, features: ArrayView2<'_, f64>) -> Result<RawScores, ModelError>;

    /// Native global importance as `(feature, score)` pairs, unsorted
    fn feature_importance(&self) -> Option<Vec<(String, f64)>> {
        None
    }

    fn explainer(&self) -> Option<&dyn Explainer> {
        None
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Hand-rolled models for pipeline tests

    use super::*;

    /// Returns the same score row for every input row
    pub struct StubModel {
        pub layout: ScoreLayout,
        pub row: Vec<f64>,
        pub names: Vec<String>,
        pub importance: Option<Vec<(String, f64)>>,
        pub shap: Option<Result<Vec<Array2<f64>>, String>>,
        pub fail_inference: bool,
    }

    impl StubModel {
        pub fn binary(p: f64) -> Self {
            Self {
                layout: ScoreLayout::Binary,
                row: vec![p],
                names: Vec::new(),
                importance: None,
                shap: None,
                fail_inference: false,
            }
        }

        pub fn multi_class(row: Vec<f64>) -> Self {
            Self {
                layout: ScoreLayout::MultiClass,
                row,
                ..Self::binary(0.0)
            }
        }
    }

    impl Explainer for StubModel {
        fn shap_values(&self, _features: ArrayView2<'_, f64>) -> Result<Vec<Array2<f64>>, ModelError> {
            match &self.shap {
                Some(Ok(values)) => Ok(values.clone()),
                Some(Err(msg)) => Err(ModelError::Attribution(msg.clone())),
                None => Err(ModelError::Attribution("no explainer".to_string())),
            }
        }
    }

    impl TabularModel for StubModel {
        fn family(&self) -> ModelFamily {
            ModelFamily::LightGbm
        }

        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn infer(&self, features: ArrayView2<'_, f64>) -> Result<RawScores, ModelError> {
            if self.fail_inference {
                return Err(ModelError::Inference("stub failure".to_string()));
            }
            let rows = features.nrows();
            let values = Array2::from_shape_fn((rows, self.row.len()), |(_, j)| self.row[j]);
            Ok(RawScores { layout: self.layout, values })
        }

        fn feature_importance(&self) -> Option<Vec<(String, f64)>> {
            self.importance.clone()
        }

        fn explainer(&self) -> Option<&dyn Explainer> {
            self.shap.as_ref().map(|_| self as &dyn Explainer)
        }
    }
}
