//! Feature Preparer
//!
//! Maps loosely-structured request rows onto the fixed, ordered feature vector the
//! model was trained on. Missing or non-numeric values become `0.0`; no imputation
//! beyond that happens here.

use ndarray::Array2;
use serde_json::Value;

use super::{ModelError, ScalerParameters};

/// One request row: field name → JSON value
pub type InputRow = serde_json::Map<String, Value>;

/// Short catalogue names and their Kepler Object of Interest (KOI) column names.
/// A declared feature is looked up under its own name first, then under its alias.
pub const FEATURE_ALIASES: &[(&str, &str)] = &[
    ("period", "koi_period"),
    ("duration_hr", "koi_duration"),
    ("depth_ppm", "koi_depth"),
    ("snr", "koi_model_snr"),
    ("teff", "koi_steff"),
    ("logg", "koi_slogg"),
    ("tmag", "koi_kepmag"),
];

/// KOI cumulative-table columns the production model is trained on
pub const KOI_FEATURES: &[&str] = &[
    "koi_fpflag_nt", "koi_fpflag_ss", "koi_fpflag_co", "koi_fpflag_ec",
    "koi_period", "koi_period_err1", "koi_period_err2", "koi_time0bk",
    "koi_time0bk_err1", "koi_time0bk_err2", "koi_impact", "koi_impact_err1",
    "koi_impact_err2", "koi_duration", "koi_duration_err1", "koi_duration_err2",
    "koi_depth", "koi_depth_err1", "koi_depth_err2", "koi_prad", "koi_prad_err1",
    "koi_prad_err2", "koi_teq", "koi_insol", "koi_insol_err1", "koi_insol_err2",
    "koi_model_snr", "koi_tce_plnt_num", "koi_steff", "koi_steff_err1", "koi_steff_err2",
    "koi_slogg", "koi_slogg_err1", "koi_slogg_err2", "koi_srad", "koi_srad_err1",
    "koi_srad_err2", "ra", "dec", "koi_kepmag",
];

/// Alias of a feature name in either direction
pub fn alias_of(name: &str) -> Option<&'static str> {
    FEATURE_ALIASES.iter().find_map(|&(short, koi)| {
        if short == name {
            Some(koi)
        } else if koi == name {
            Some(short)
        } else {
            None
        }
    })
}

/// Numeric view of a JSON value; anything unusable is `0.0`
fn coerce(value: &Value) -> f64 {
    let v = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    };
    if v.is_nan() {
        0.0
    } else {
        v
    }
}

/// Value of a declared feature in a row, honouring aliases
pub fn feature_value(row: &InputRow, name: &str) -> f64 {
    row.get(name)
        .filter(|v| !v.is_null())
        .or_else(|| alias_of(name).and_then(|alias| row.get(alias)))
        .map(coerce)
        .unwrap_or(0.0)
}

/// Turns request rows into the model's input matrix
#[derive(Debug, Clone)]
pub struct FeaturePreparer {
    names: Vec<String>,
    scaler: Option<ScalerParameters>,
}

impl FeaturePreparer {
    pub fn new(names: Vec<String>, scaler: Option<ScalerParameters>) -> Result<Self, ModelError> {
        if names.is_empty() {
            return Err(ModelError::InvalidFeatures("feature list is empty".to_string()));
        }
        if let Some(s) = &scaler {
            if s.len() != names.len() {
                return Err(ModelError::InvalidScaler(format!(
                    "scaler has {} entries for {} features",
                    s.len(),
                    names.len()
                )));
            }
        }
        Ok(Self { names, scaler })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_scaler(&self) -> bool {
        self.scaler.is_some()
    }

    /// `rows × features` matrix in declared order, standardized when a scaler is loaded
    pub fn prepare(&self, rows: &[InputRow]) -> Array2<f64> {
        let mut matrix = Array2::from_shape_fn((rows.len(), self.names.len()), |(i, j)| {
            feature_value(&rows[i], &self.names[j])
        });

        if let Some(scaler) = &self.scaler {
            scaler.apply(&mut matrix);
        }

        matrix
    }
}
