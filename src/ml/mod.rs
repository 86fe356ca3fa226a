//! Tabular prediction pipeline
//!
//! ```text
//! rows ──► FeaturePreparer ──► Predictor ──► AttributionEngine ──► PredictionAssembler
//!            (features)        (predictor)     (attribution)          (assembler)
//!                                  │
//!                                  ▼
//!                          dyn TabularModel  (lightgbm | onnx)
//! ```
//!
//! Everything here is synchronous and owns no mutable state after load, so a single
//! `ModelService` is shared read-only across request handlers.

pub mod assembler;
pub mod attribution;
pub mod fallback;
pub mod features;
pub mod lightgbm;
pub mod loader;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod predictor;
pub mod scaler;
pub mod service;
pub mod types;

use std::path::PathBuf;

pub use attribution::{Attribution, AttributionEngine, AttributionSource};
pub use fallback::FallbackPredictor;
pub use features::{FeaturePreparer, InputRow};
pub use loader::LoadedModel;
pub use model::{Explainer, ModelFamily, RawScores, ScoreLayout, TabularModel};
pub use scaler::ScalerParameters;
pub use service::{ModelService, TabularPredictions};
pub use types::{AttributionPair, Explanation, Prediction, ProbabilityDistribution, TabularExplanation};

/// Number of attribution pairs kept when nothing else is configured
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no model file matching best_model.* in {0}")]
    ModelNotFound(PathBuf),

    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid feature list: {0}")]
    InvalidFeatures(String),

    #[error("invalid scaler parameters: {0}")]
    InvalidScaler(String),

    #[error("failed to parse model: {0}")]
    Parse(String),

    #[error("model expects {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("attribution failed: {0}")]
    Attribution(String),
}
