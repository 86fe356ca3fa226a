//! Process-local object store

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{ObjectInfo, ObjectStore, StorageBackend, StorageError};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the given buckets already created
    pub fn with_buckets<'a>(buckets: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::new();
        {
            let mut map = store.buckets.write();
            for bucket in buckets {
                map.entry(bucket.to_string()).or_default();
            }
        }
        store
    }
}

#[axum::async_trait]
impl ObjectStore for MemoryObjectStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.buckets.write().entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, o)| ObjectInfo {
                key: key.clone(),
                size: o.data.len() as u64,
                last_modified: Some(o.last_modified),
            })
            .collect())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        if let Some(objects) = self.buckets.write().get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_list_delete() {
        tokio_test::block_on(async {
            let store = MemoryObjectStore::with_buckets(["datasets"]);
            store.put_object("datasets", "datasets/b.csv", b"b".to_vec(), "text/csv").await.unwrap();
            store.put_object("datasets", "datasets/a.csv", b"aa".to_vec(), "text/csv").await.unwrap();
            store.put_object("datasets", "meta/a.json", b"{}".to_vec(), "application/json").await.unwrap();

            let listed = store.list_objects("datasets", "datasets/").await.unwrap();
            let keys: Vec<_> = listed.iter().map(|o| o.key.as_str()).collect();
            assert_eq!(keys, vec!["datasets/a.csv", "datasets/b.csv"]);
            assert_eq!(listed[0].size, 2);

            assert_eq!(store.get_object("datasets", "datasets/a.csv").await.unwrap(), b"aa");

            store.delete_object("datasets", "datasets/a.csv").await.unwrap();
            assert!(matches!(
                store.get_object("datasets", "datasets/a.csv").await,
                Err(StorageError::NotFound { .. })
            ));
        });
    }

    #[test]
    fn test_missing_bucket() {
        tokio_test::block_on(async {
            let store = MemoryObjectStore::new();
            assert!(matches!(
                store.put_object("nope", "k", Vec::new(), "text/plain").await,
                Err(StorageError::BucketNotFound(_))
            ));
            store.ensure_bucket("nope").await.unwrap();
            store.put_object("nope", "k", Vec::new(), "text/plain").await.unwrap();
        });
    }
}
