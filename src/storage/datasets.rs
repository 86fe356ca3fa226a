//! Dataset upload and retrieval
//!
//! Blobs live under `datasets/` in the datasets bucket; each upload also writes a
//! `meta/{dataset_id}.json` record so listing does not need to parse blob keys.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::{ObjectStore, StorageBackend, StorageError};
use crate::config::Config;
use crate::models::Dataset;
use crate::{AppError, AppResult};

pub const DATA_PREFIX: &str = "datasets/";
pub const META_PREFIX: &str = "meta/";

fn meta_key(dataset_id: &str) -> String {
    format!("{}{}.json", META_PREFIX, dataset_id)
}

/// Extension after the last dot, `txt` when there is none
fn extension_of(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => "txt",
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

pub struct DatasetService {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    allowed_types: Vec<String>,
    max_file_size: usize,
}

impl DatasetService {
    pub fn new(store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        Self {
            store,
            bucket: config.storage.bucket_datasets.clone(),
            allowed_types: config.allowed_file_types.clone(),
            max_file_size: config.max_file_size,
        }
    }

    pub fn backend(&self) -> StorageBackend {
        self.store.backend()
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn check_filename(&self, filename: &str) -> AppResult<()> {
        let lower = filename.to_lowercase();
        if self.allowed_types.iter().any(|ext| lower.ends_with(ext.as_str())) {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "Unsupported file type. Allowed types: {}",
                self.allowed_types.join(", ")
            )))
        }
    }

    pub fn check_size(&self, size: usize) -> AppResult<()> {
        if size > self.max_file_size {
            return Err(AppError::BadRequest(format!(
                "File size exceeds limit ({:.1}MB)",
                self.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    pub async fn upload(
        &self,
        filename: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> AppResult<Dataset> {
        self.check_filename(filename)?;
        self.check_size(data.len())?;

        let dataset_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let object_key = format!(
            "{}{}_{}.{}",
            DATA_PREFIX,
            now.format("%Y%m%d_%H%M%S"),
            dataset_id,
            extension_of(filename)
        );

        let dataset = Dataset {
            dataset_id: dataset_id.clone(),
            object_key: object_key.clone(),
            size: data.len() as u64,
            filename: filename.to_string(),
            uploaded_at: now,
        };

        self.store
            .put_object(
                &self.bucket,
                &object_key,
                data,
                content_type.unwrap_or("application/octet-stream"),
            )
            .await?;
        self.store
            .put_object(
                &self.bucket,
                &meta_key(&dataset_id),
                serde_json::to_vec(&dataset).map_err(StorageError::from)?,
                "application/json",
            )
            .await?;

        tracing::info!("Dataset uploaded: {} ({} bytes) as {}", filename, dataset.size, object_key);

        Ok(dataset)
    }

    /// Newest first
    pub async fn list(&self) -> AppResult<Vec<Dataset>> {
        let records = self.store.list_objects(&self.bucket, META_PREFIX).await?;

        let mut datasets = Vec::with_capacity(records.len());
        for record in records {
            let raw = self.store.get_object(&self.bucket, &record.key).await?;
            match serde_json::from_slice::<Dataset>(&raw) {
                Ok(dataset) => datasets.push(dataset),
                Err(e) => tracing::warn!("Skipping unreadable dataset record {}: {}", record.key, e),
            }
        }

        datasets.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(datasets)
    }

    /// Metadata record first, then a scan of blob keys for the id
    pub async fn find(&self, dataset_id: &str) -> AppResult<Dataset> {
        let not_found = || AppError::NotFound(format!("Dataset not found: {}", dataset_id));
        if !is_valid_id(dataset_id) {
            return Err(not_found());
        }

        match self.store.get_object(&self.bucket, &meta_key(dataset_id)).await {
            Ok(raw) => return Ok(serde_json::from_slice(&raw).map_err(StorageError::from)?),
            Err(StorageError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let object = self
            .store
            .list_objects(&self.bucket, DATA_PREFIX)
            .await?
            .into_iter()
            .find(|o| o.key.contains(dataset_id))
            .ok_or_else(not_found)?;

        let filename = object.key.trim_start_matches(DATA_PREFIX).to_string();
        Ok(Dataset {
            dataset_id: dataset_id.to_string(),
            size: object.size,
            uploaded_at: object.last_modified.unwrap_or_else(Utc::now),
            object_key: object.key,
            filename,
        })
    }

    /// Blob content as UTF-8 text
    pub async fn content(&self, dataset_id: &str) -> AppResult<String> {
        let dataset = self.find(dataset_id).await?;
        let raw = match self.store.get_object(&self.bucket, &dataset.object_key).await {
            Ok(raw) => raw,
            Err(StorageError::NotFound { .. }) => {
                return Err(AppError::NotFound(format!("Dataset not found: {}", dataset_id)))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;

    fn service() -> (Arc<MemoryObjectStore>, DatasetService) {
        let store = Arc::new(MemoryObjectStore::with_buckets(["datasets"]));
        let config = Config {
            max_file_size: 16,
            ..Config::default()
        };
        (store.clone(), DatasetService::new(store, &config))
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension_of("koi.CSV"), "CSV");
        assert_eq!(extension_of("archive.tar.json"), "json");
        assert_eq!(extension_of("README"), "txt");
    }

    #[tokio::test]
    async fn test_upload_list_content() {
        let (store, svc) = service();
        let dataset = svc.upload("koi.csv", b"a,b\n1,2\n".to_vec(), Some("text/csv")).await.unwrap();

        assert!(dataset.object_key.starts_with("datasets/"));
        assert!(dataset.object_key.ends_with(&format!("_{}.csv", dataset.dataset_id)));
        assert_eq!(dataset.size, 8);
        assert!(store.get_object("datasets", &dataset.object_key).await.is_ok());

        let listed = svc.list().await.unwrap();
        assert_eq!(listed, vec![dataset.clone()]);

        assert_eq!(svc.content(&dataset.dataset_id).await.unwrap(), "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_content_found_by_key_scan() {
        let (store, svc) = service();
        let id = "0f8fad5b-d9cb-469f-a165-70867728950e";
        store
            .put_object("datasets", &format!("datasets/20240101_000000_{}.csv", id), b"x".to_vec(), "text/csv")
            .await
            .unwrap();
        assert_eq!(svc.content(id).await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let (_, svc) = service();
        assert!(matches!(
            svc.upload("tool.exe", b"MZ".to_vec(), None).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            svc.upload("big.csv", vec![b'x'; 17], None).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_or_malformed_id() {
        let (_, svc) = service();
        assert!(matches!(svc.content("missing").await, Err(AppError::NotFound(_))));
        assert!(matches!(svc.content("../etc").await, Err(AppError::NotFound(_))));
        assert!(matches!(svc.content("").await, Err(AppError::NotFound(_))));
    }
}
