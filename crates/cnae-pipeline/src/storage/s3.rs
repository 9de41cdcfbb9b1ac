use super::{BucketStatus, ObjectStore, StorageError, UploadResult};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client,
};
use cnae_common::checksum::{sha256_bytes, sha256_file};
use std::path::Path;
use tokio::task;
use tracing::{debug, info, instrument, warn};

/// S3-compatible backend (MinIO in development)
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> Self {
        debug!("Initializing object storage client: {:?}", config);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "cnae-pipeline",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(
            "Object storage client ready (endpoint: {})",
            config.endpoint.as_deref().unwrap_or("aws default")
        );

        Self {
            client: Client::from_conf(builder.build()),
            region: config.region.clone(),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 is the implicit location and rejects an explicit constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| request_error("CreateBucket", bucket, "", e))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self))]
    async fn ensure_bucket(&self, bucket: &str) -> Result<BucketStatus, StorageError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!("Bucket '{}' found", bucket);
                Ok(BucketStatus::Existing)
            },
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                warn!("Bucket '{}' does not exist. Creating...", bucket);
                self.create_bucket(bucket).await?;
                Ok(BucketStatus::Created)
            },
            Err(e) => Err(request_error("HeadBucket", bucket, "", e)),
        }
    }

    #[instrument(skip(self, data))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<UploadResult, StorageError> {
        let checksum = sha256_bytes(&data);
        let size = data.len() as u64;

        debug!("Uploading {} bytes to s3://{}/{}", size, bucket, key);

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| request_error("PutObject", bucket, key, e))?;

        info!("Uploaded s3://{}/{} ({} bytes)", bucket, key, size);

        Ok(UploadResult {
            bucket: bucket.to_string(),
            key: key.to_string(),
            checksum,
            size,
        })
    }

    #[instrument(skip(self))]
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<UploadResult, StorageError> {
        let size = tokio::fs::metadata(path).await?.len();
        let checksum = file_checksum(path).await?;

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| request_error("PutObject", bucket, key, e))?;

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(size as i64)
            .body(body);

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| request_error("PutObject", bucket, key, e))?;

        info!(
            "Uploaded {} to s3://{}/{} ({} bytes)",
            path.display(),
            bucket,
            key,
            size
        );

        Ok(UploadResult {
            bucket: bucket.to_string(),
            key: key.to_string(),
            checksum,
            size,
        })
    }

    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        debug!("Downloading s3://{}/{}", bucket, key);

        let response = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Err(StorageError::NoSuchKey {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            },
            Err(e) => return Err(request_error("GetObject", bucket, key, e)),
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| request_error("GetObject", bucket, key, e))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), bucket, key);

        Ok(data)
    }
}

/// SHA-256 of a local file, hashed on the blocking pool
pub(crate) async fn file_checksum(path: &Path) -> Result<String, StorageError> {
    let owned = path.to_path_buf();
    let digest = task::spawn_blocking(move || sha256_file(owned))
        .await
        .map_err(|e| std::io::Error::other(format!("checksum task failed: {}", e)))??;
    Ok(digest)
}

fn request_error<E>(operation: &'static str, bucket: &str, key: &str, err: E) -> StorageError
where
    E: std::error::Error,
{
    StorageError::Request {
        operation,
        bucket: bucket.to_string(),
        key: key.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_checksum_matches_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"PK\x03\x04 raw archive").unwrap();

        assert_eq!(
            file_checksum(file.path()).await.unwrap(),
            sha256_bytes(b"PK\x03\x04 raw archive")
        );
    }

    #[tokio::test]
    async fn test_file_checksum_missing_file() {
        let err = file_checksum(Path::new("/nonexistent/Cnaes.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Checksum(_)));
    }
}
