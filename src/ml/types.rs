//! Prediction value types shared by the pipeline and the HTTP layer

use serde::{Deserialize, Serialize};

/// Class probabilities for one row.
///
/// Binary models fill `POSITIVE`/`NEGATIVE` plus the derived `CONF`/`PC`/`FP`;
/// multi-class models fill only `CONF`/`PC`/`FP`. Absent keys are omitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProbabilityDistribution {
    #[serde(rename = "POSITIVE", default, skip_serializing_if = "Option::is_none")]
    pub positive: Option<f64>,
    #[serde(rename = "NEGATIVE", default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<f64>,
    #[serde(rename = "CONF", default, skip_serializing_if = "Option::is_none")]
    pub conf: Option<f64>,
    #[serde(rename = "PC", default, skip_serializing_if = "Option::is_none")]
    pub pc: Option<f64>,
    #[serde(rename = "FP", default, skip_serializing_if = "Option::is_none")]
    pub fp: Option<f64>,
}

impl ProbabilityDistribution {
    pub fn binary(positive: f64, negative: f64) -> Self {
        Self {
            positive: Some(positive),
            negative: Some(negative),
            ..Default::default()
        }
    }

    pub fn multi_class(conf: f64, pc: f64, fp: f64) -> Self {
        Self {
            conf: Some(conf),
            pc: Some(pc),
            fp: Some(fp),
            ..Default::default()
        }
    }

    /// All present values, in key order
    pub fn values(&self) -> impl Iterator<Item = f64> {
        [self.positive, self.negative, self.conf, self.pc, self.fp]
            .into_iter()
            .flatten()
    }
}

/// `(feature_name, weight)`; serialized as a two-element JSON array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionPair(pub String, pub f64);

impl AttributionPair {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self(name.into(), weight)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn weight(&self) -> f64 {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularExplanation {
    pub shap: Vec<AttributionPair>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabular: Option<TabularExplanation>,
}

/// One classified row. Built once per request row and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub object_id: String,
    pub probs: ProbabilityDistribution,
    pub conf: f64,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<Explanation>,
    /// Time-series importance, only produced by curve models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Vec<f64>>,
}

impl Prediction {
    /// Per-sample attribution pairs, if any
    pub fn attribution(&self) -> &[AttributionPair] {
        self.explain
            .as_ref()
            .and_then(|e| e.tabular.as_ref())
            .map(|t| t.shap.as_slice())
            .unwrap_or(&[])
    }
}
