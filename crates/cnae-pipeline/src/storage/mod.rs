//! Object storage for bronze and silver artifacts
//!
//! Stages talk to an [`ObjectStore`] rather than to the AWS SDK directly.
//! [`S3Store`] is the production backend (MinIO or AWS); [`MemoryStore`]
//! keeps buckets in process and is what the stage tests run against.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

/// Object storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{operation} s3://{bucket}/{key} failed: {message}")]
    Request {
        operation: &'static str,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Bucket does not exist: {0}")]
    NoSuchBucket(String),

    #[error("Object does not exist: s3://{bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum failed: {0}")]
    Checksum(#[from] cnae_common::CnaeError),
}

/// Result of the bucket existence check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    Existing,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub bucket: String,
    pub key: String,
    /// Hex SHA-256 of the uploaded bytes
    pub checksum: String,
    pub size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check for the bucket and create it when it is missing
    async fn ensure_bucket(&self, bucket: &str) -> Result<BucketStatus, StorageError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<UploadResult, StorageError>;

    /// Upload a local file
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<UploadResult, StorageError> {
        let data = tokio::fs::read(path).await?;
        self.put_object(bucket, key, data, content_type).await
    }

    /// Fetch a whole object into memory
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
}
