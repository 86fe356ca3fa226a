//! Dataset models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded dataset. Also the metadata record stored next to the blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub dataset_id: String,
    pub object_key: String,
    pub size: u64,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetContent {
    pub dataset_id: String,
    pub content: String,
}
