use super::{BucketStatus, ObjectStore, StorageError, UploadResult};
use async_trait::async_trait;
use cnae_common::checksum::sha256_bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type Buckets = HashMap<String, HashMap<String, Vec<u8>>>;

/// In-process object store
///
/// Behaves like S3 for the operations the pipeline uses: writes into a
/// missing bucket fail, reads of missing keys fail. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    buckets: Arc<Mutex<Buckets>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.lock().entry(bucket.to_string()).or_default();
        self
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.lock().contains_key(bucket)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock().get(bucket).and_then(|b| b.get(key)).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        // A panic while holding the lock leaves the maps intact
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<BucketStatus, StorageError> {
        let mut buckets = self.lock();
        if buckets.contains_key(bucket) {
            Ok(BucketStatus::Existing)
        } else {
            buckets.insert(bucket.to_string(), HashMap::new());
            Ok(BucketStatus::Created)
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<UploadResult, StorageError> {
        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;

        let result = UploadResult {
            bucket: bucket.to_string(),
            key: key.to_string(),
            checksum: sha256_bytes(&data),
            size: data.len() as u64,
        };
        objects.insert(key.to_string(), data);
        Ok(result)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let buckets = self.lock();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;

        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NoSuchKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}
