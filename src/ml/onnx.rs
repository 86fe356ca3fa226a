//! ONNX Runtime adapter (`onnx` feature)
//!
//! Expects a classifier exported with a float probability tensor output
//! (`zipmap=False` for scikit-learn exports). A single output column is treated as
//! the positive-class probability; two columns as binary; more as multi-class.

use std::path::Path;

use ndarray::{Array2, ArrayView2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;

use super::model::{ModelFamily, RawScores, TabularModel};
use super::ModelError;

/// Output names tried before falling back to the last declared output
const PROBABILITY_OUTPUTS: [&str; 3] = ["probabilities", "output_probability", "probs"];

pub struct OnnxModel {
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        tracing::info!("Loading ONNX model from: {}", path.display());

        let session = Session::builder()
            .map_err(|e| ModelError::Parse(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Parse(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| ModelError::Parse(format!("Failed to load model: {}", e)))?;

        let output_name = PROBABILITY_OUTPUTS
            .iter()
            .find(|name| session.outputs.iter().any(|o| o.name == **name))
            .map(|name| name.to_string())
            .or_else(|| session.outputs.last().map(|o| o.name.clone()))
            .ok_or_else(|| ModelError::Parse("ONNX model declares no outputs".to_string()))?;

        tracing::debug!("ONNX probability output: {}", output_name);

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl TabularModel for OnnxModel {
    fn family(&self) -> ModelFamily {
        ModelFamily::Onnx
    }

    fn feature_names(&self) -> &[String] {
        &[]
    }

    fn infer(&self, features: ArrayView2<'_, f64>) -> Result<RawScores, ModelError> {
        let rows = features.nrows();
        let input = features.mapv(|v| v as f32);

        let input_tensor = Value::from_array(input)
            .map_err(|e| ModelError::Inference(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ModelError::Inference(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| ModelError::Inference(format!("No output named {}", self.output_name)))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(format!("Extract error: {}", e)))?;

        if rows == 0 || data.len() % rows != 0 {
            return Err(ModelError::Inference(format!(
                "output of {} values does not split into {} rows",
                data.len(),
                rows
            )));
        }
        let cols = data.len() / rows;

        let values = Array2::from_shape_vec((rows, cols), data.iter().map(|&v| v as f64).collect())
            .map_err(|e| ModelError::Inference(format!("Array error: {}", e)))?;

        Ok(if cols <= 2 {
            RawScores::binary(values)
        } else {
            RawScores::multi_class(values)
        })
    }
}
