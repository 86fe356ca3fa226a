//! User feedback persistence

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{ObjectStore, StorageError};
use crate::models::FeedbackRequest;
use crate::AppResult;

pub const FEEDBACK_PREFIX: &str = "feedback/";

#[derive(Serialize)]
struct FeedbackRecord<'a> {
    #[serde(flatten)]
    request: &'a FeedbackRequest,
    feedback_id: &'a str,
    created_at: String,
}

pub struct FeedbackService {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Store the feedback as JSON and return its id
    pub async fn save(&self, request: &FeedbackRequest) -> AppResult<String> {
        let feedback_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let key = format!(
            "{}{}_{}.json",
            FEEDBACK_PREFIX,
            now.format("%Y%m%d_%H%M%S"),
            feedback_id
        );

        let record = FeedbackRecord {
            request,
            feedback_id: &feedback_id,
            created_at: now.to_rfc3339(),
        };
        let body = serde_json::to_vec_pretty(&record).map_err(StorageError::from)?;

        self.store
            .put_object(&self.bucket, &key, body, "application/json")
            .await?;

        tracing::info!(
            "Feedback {} saved for target {} ({:?})",
            feedback_id,
            request.target_id,
            request.user_label
        );

        Ok(feedback_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserLabel;
    use crate::storage::MemoryObjectStore;

    #[tokio::test]
    async fn test_feedback_record_layout() {
        let store = Arc::new(MemoryObjectStore::with_buckets(["feedback"]));
        let svc = FeedbackService::new(store.clone(), "feedback");

        let request = FeedbackRequest {
            target_id: "K00752.01".to_string(),
            user_label: UserLabel::Confirmed,
            confidence: 0.9,
            notes: Some("clear transit".to_string()),
        };
        let id = svc.save(&request).await.unwrap();

        let objects = store.list_objects("feedback", FEEDBACK_PREFIX).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert!(objects[0].key.ends_with(&format!("_{}.json", id)));

        let raw = store.get_object("feedback", &objects[0].key).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["target_id"], "K00752.01");
        assert_eq!(json["user_label"], "CONF");
        assert_eq!(json["feedback_id"], id.as_str());
        assert!(json["created_at"].is_string());
    }
}
