//! Bronze stage: fetch the raw CNAE archive and store it untouched

use crate::config::{PipelineConfig, SourceConfig};
use crate::error::{Result, StageError};
use crate::stage::{Stage, StageOutcome};
use crate::storage::{ObjectStore, UploadResult};
use async_trait::async_trait;
use cnae_common::{ArtifactRef, Tier};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, instrument, warn};

/// Where the uploaded artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    /// An existing local copy; no network access happened
    Cache,
    /// Freshly downloaded, with the number of body bytes received
    Network { bytes: u64 },
}

impl std::fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactSource::Cache => write!(f, "local cache"),
            ArtifactSource::Network { bytes } => write!(f, "network, {} bytes", bytes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub source: ArtifactSource,
    pub artifact: ArtifactRef,
    pub upload: UploadResult,
}

pub struct Fetcher {
    source: SourceConfig,
    bucket: String,
    key: String,
    store: Arc<dyn ObjectStore>,
}

impl Fetcher {
    pub fn new(config: &PipelineConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            source: config.source.clone(),
            bucket: config.storage.raw_bucket.clone(),
            key: config.storage.raw_key.clone(),
            store,
        }
    }

    /// Make sure the raw archive is in the bronze bucket
    ///
    /// A file already present at the cache path is uploaded as-is. Otherwise
    /// the archive is downloaded to the cache path first.
    #[instrument(skip(self), fields(url = %self.source.url))]
    pub async fn fetch(&self) -> Result<FetchOutcome> {
        self.store.ensure_bucket(&self.bucket).await?;

        let cache_path = &self.source.cache_path;
        let source = if tokio::fs::try_exists(cache_path).await? {
            info!("File found locally at: {}", cache_path.display());
            info!("Skipping internet download (contingency mode)");
            ArtifactSource::Cache
        } else {
            info!("File not found locally. Attempting download...");
            let bytes = self.download(cache_path).await?;
            ArtifactSource::Network { bytes }
        };

        info!("Uploading {} to object storage...", self.key);
        let upload = self
            .store
            .put_file(&self.bucket, &self.key, cache_path, Some("application/zip"))
            .await?;

        let artifact = ArtifactRef::new(Tier::Bronze, &self.bucket, &self.key);
        info!("File available in the data lake: {}", artifact);

        Ok(FetchOutcome {
            source,
            artifact,
            upload,
        })
    }

    /// Stream the source URL into `dest`, returning the number of bytes written
    ///
    /// The body goes to `<dest>.part` first and is renamed into place only
    /// once complete, so a failed download never leaves a file that the next
    /// run would mistake for a cached copy.
    pub async fn download(&self, dest: &Path) -> Result<u64> {
        info!("Starting download from: {}", self.source.url);

        let client = Client::builder()
            .connect_timeout(self.source.timeout())
            .read_timeout(self.source.timeout())
            .user_agent(&self.source.user_agent)
            .danger_accept_invalid_certs(self.source.accept_invalid_certs)
            .build()?;

        let response = client.get(&self.source.url).send().await.map_err(|e| {
            warn!("Critical failure during download: {}", e);
            StageError::Download(format!("{}: {}", self.source.url, e))
        })?;

        if response.status() != StatusCode::OK {
            warn!("Failed to download file. Status code: {}", response.status());
            return Err(StageError::Download(format!(
                "{} returned HTTP {}",
                self.source.url,
                response.status()
            )));
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = part_path(dest);
        let progress = progress_bar(response.content_length(), dest);

        let written = match self.write_body(response, &part, &progress).await {
            Ok(written) => written,
            Err(e) => {
                progress.abandon();
                if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                    warn!("Could not remove partial download {}: {}", part.display(), cleanup);
                }
                return Err(e);
            },
        };

        tokio::fs::rename(&part, dest).await?;
        progress.finish_and_clear();

        info!("Download completed and saved at: {} ({} bytes)", dest.display(), written);
        Ok(written)
    }

    async fn write_body(
        &self,
        response: reqwest::Response,
        part: &Path,
        progress: &ProgressBar,
    ) -> Result<u64> {
        let file = tokio::fs::File::create(part).await?;
        let mut writer = BufWriter::with_capacity(self.source.chunk_size, file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                StageError::Download(format!("{}: body interrupted: {}", self.source.url, e))
            })?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.set_position(written);
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl Stage for Fetcher {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn label(&self) -> &'static str {
        "Bronze Ingestion (object storage)"
    }

    async fn run(&self) -> Result<StageOutcome> {
        self.fetch().await.map(StageOutcome::Fetched)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn progress_bar(total: Option<u64>, dest: &Path) -> ProgressBar {
    let Some(total) = total else {
        return ProgressBar::hidden();
    };

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(format!(
        "Downloading {}",
        dest.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    ));
    pb
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("data/raw/Cnaes.zip")),
            PathBuf::from("data/raw/Cnaes.zip.part")
        );
    }

    #[test]
    fn test_artifact_source_display() {
        assert_eq!(ArtifactSource::Cache.to_string(), "local cache");
        assert_eq!(
            ArtifactSource::Network { bytes: 42 }.to_string(),
            "network, 42 bytes"
        );
    }
}
