//! Standardization parameters (`(x - mean) / scale` per feature)

use ndarray::{Array1, Array2};
use serde_json::Value;

use super::ModelError;

/// Mean/scale arrays aligned to the feature order
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerParameters {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl ScalerParameters {
    /// Zero scale entries become 1.0 so constant training columns pass through centred.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        if mean.len() != scale.len() {
            return Err(ModelError::InvalidScaler(format!(
                "mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            )));
        }
        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidScaler("non-finite value".to_string()));
        }

        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();

        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    /// Parse `scaler_params.json`.
    ///
    /// Accepts the scikit-learn attribute names (`mean_`, `scale_`) or the short
    /// names (`mean`, `scale`); the former win when both are present.
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let data: Value = serde_json::from_str(text)
            .map_err(|e| ModelError::InvalidScaler(e.to_string()))?;

        let pick = |mean_key: &str, scale_key: &str| match (data.get(mean_key), data.get(scale_key)) {
            (Some(m), Some(s)) => Some((m.clone(), s.clone())),
            _ => None,
        };

        let (mean, scale) = pick("mean_", "scale_")
            .or_else(|| pick("mean", "scale"))
            .ok_or_else(|| {
                ModelError::InvalidScaler("expected mean_/scale_ or mean/scale arrays".to_string())
            })?;

        let mean: Vec<f64> = serde_json::from_value(mean)
            .map_err(|e| ModelError::InvalidScaler(format!("mean: {}", e)))?;
        let scale: Vec<f64> = serde_json::from_value(scale)
            .map_err(|e| ModelError::InvalidScaler(format!("scale: {}", e)))?;

        Self::new(mean, scale)
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Standardize every row in place. Column count must equal [`Self::len`].
    pub fn apply(&self, matrix: &mut Array2<f64>) {
        for mut row in matrix.rows_mut() {
            row -= &self.mean;
            row /= &self.scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sklearn_names_preferred() {
        let scaler = ScalerParameters::from_json(
            r#"{"mean_": [1.0, 2.0], "scale_": [2.0, 4.0], "mean": [9.0, 9.0], "scale": [1.0, 1.0]}"#,
        )
        .unwrap();

        let mut m = array![[3.0, 6.0]];
        scaler.apply(&mut m);
        assert_eq!(m, array![[1.0, 1.0]]);
    }

    #[test]
    fn test_short_names() {
        let scaler = ScalerParameters::from_json(r#"{"mean": [0.5], "scale": [0.25]}"#).unwrap();
        let mut m = array![[0.0], [1.0]];
        scaler.apply(&mut m);
        assert_eq!(m, array![[-2.0], [2.0]]);
    }

    #[test]
    fn test_zero_scale_is_identity_divisor() {
        let scaler = ScalerParameters::new(vec![1.0], vec![0.0]).unwrap();
        let mut m = array![[4.0]];
        scaler.apply(&mut m);
        assert_eq!(m, array![[3.0]]);
    }

    #[test]
    fn test_malformed_scaler_rejected() {
        assert!(ScalerParameters::from_json("not json").is_err());
        assert!(ScalerParameters::from_json(r#"{"mean": [1.0]}"#).is_err());
        assert!(ScalerParameters::from_json(r#"{"mean": [1.0], "scale": [1.0, 2.0]}"#).is_err());
        assert!(ScalerParameters::from_json(r#"{"mean": ["a"], "scale": [1.0]}"#).is_err());
    }
}
