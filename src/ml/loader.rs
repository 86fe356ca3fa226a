//! Model directory loading
//!
//! Layout: `best_model.<ext>`, optional `features.json`, optional `scaler_params.json`.
//! Every problem found here is fatal; the adapter decides what degraded mode means.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::lightgbm::LightGbmModel;
use super::{ModelError, ScalerParameters, TabularModel};

pub const MODEL_STEM: &str = "best_model";
pub const FEATURES_FILE: &str = "features.json";
pub const SCALER_FILE: &str = "scaler_params.json";

/// Everything the pipeline needs from disk
pub struct LoadedModel {
    pub model: Box<dyn TabularModel>,
    pub feature_names: Vec<String>,
    pub scaler: Option<ScalerParameters>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("family", &self.model.family())
            .field("feature_names", &self.feature_names)
            .field("scaler", &self.scaler.is_some())
            .finish()
    }
}

fn read(path: &Path) -> Result<String, ModelError> {
    fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// First `best_model.*` file in lexical order
fn find_model_file(dir: &Path) -> Result<PathBuf, ModelError> {
    let entries = fs::read_dir(dir).map_err(|source| ModelError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file() && path.file_stem().and_then(|s| s.to_str()) == Some(MODEL_STEM)
        })
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::ModelNotFound(dir.to_path_buf()))
}

fn load_model(path: &Path) -> Result<Box<dyn TabularModel>, ModelError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "model" => Ok(Box::new(LightGbmModel::from_text(&read(path)?)?)),
        #[cfg(feature = "onnx")]
        "onnx" => Ok(Box::new(super::onnx::OnnxModel::load(path)?)),
        #[cfg(not(feature = "onnx"))]
        "onnx" => Err(ModelError::UnsupportedFormat(
            "ONNX models require the `onnx` feature".to_string(),
        )),
        other => Err(ModelError::UnsupportedFormat(format!(
            "{} ({})",
            if other.is_empty() { "<none>" } else { other },
            path.display()
        ))),
    }
}

/// `features.json`: a bare array of names or `{"features": [...]}`
pub fn parse_feature_list(text: &str) -> Result<Vec<String>, ModelError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ModelError::InvalidFeatures(e.to_string()))?;

    let list = match &value {
        Value::Array(_) => value,
        Value::Object(map) => map
            .get("features")
            .cloned()
            .ok_or_else(|| ModelError::InvalidFeatures("missing \"features\" key".to_string()))?,
        _ => {
            return Err(ModelError::InvalidFeatures(
                "expected an array or {\"features\": [...]}".to_string(),
            ))
        }
    };

    let names: Vec<String> =
        serde_json::from_value(list).map_err(|e| ModelError::InvalidFeatures(e.to_string()))?;
    if names.is_empty() {
        return Err(ModelError::InvalidFeatures("feature list is empty".to_string()));
    }
    Ok(names)
}

pub fn load(dir: &Path) -> Result<LoadedModel, ModelError> {
    let model_path = find_model_file(dir)?;
    tracing::debug!("Loading model artifact {}", model_path.display());
    let model = load_model(&model_path)?;

    let features_path = dir.join(FEATURES_FILE);
    let feature_names = if features_path.exists() {
        let names = parse_feature_list(&read(&features_path)?)?;
        let embedded = model.feature_names();
        if !embedded.is_empty() && embedded.len() != names.len() {
            return Err(ModelError::FeatureCountMismatch {
                expected: embedded.len(),
                actual: names.len(),
            });
        }
        names
    } else if !model.feature_names().is_empty() {
        tracing::warn!("{} not found, using feature names embedded in the model", FEATURES_FILE);
        model.feature_names().to_vec()
    } else {
        return Err(ModelError::InvalidFeatures(format!(
            "{} not found and the model carries no feature names",
            FEATURES_FILE
        )));
    };

    let scaler_path = dir.join(SCALER_FILE);
    let scaler = if scaler_path.exists() {
        let scaler = ScalerParameters::from_json(&read(&scaler_path)?)?;
        if scaler.len() != feature_names.len() {
            return Err(ModelError::InvalidScaler(format!(
                "scaler has {} entries for {} features",
                scaler.len(),
                feature_names.len()
            )));
        }
        Some(scaler)
    } else {
        None
    };

    Ok(LoadedModel {
        model,
        feature_names,
        scaler,
    })
}
