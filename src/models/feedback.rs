//! Feedback models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Label a user assigns to a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserLabel {
    #[serde(rename = "CONF")]
    Confirmed,
    #[serde(rename = "PC")]
    PlanetCandidate,
    #[serde(rename = "FP")]
    FalsePositive,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(length(min = 1, message = "target_id must not be empty"))]
    pub target_id: String,
    pub user_label: UserLabel,
    #[validate(range(min = 0.0, max = 1.0, message = "confidence must be within [0, 1]"))]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
