//! Silver stage: raw zip archive to typed Parquet
//!
//! The Receita Federal file has no header row, separates fields with `;`,
//! quotes them with `"` and is encoded in latin-1. Both columns stay text so
//! codes like `0111301` keep their leading zero.

use crate::config::{PipelineConfig, TransformConfig};
use crate::error::{Result, StageError};
use crate::parquet_io;
use crate::stage::{Stage, StageOutcome};
use crate::storage::{ObjectStore, UploadResult};
use async_trait::async_trait;
use cnae_common::{ArtifactRef, CnaeRecord, Tier};
use std::io::{Cursor, Read};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

pub const PARQUET_CONTENT_TYPE: &str = "application/vnd.apache.parquet";

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub rows: usize,
    /// First parsed row, if any
    pub sample: Option<CnaeRecord>,
    pub artifact: ArtifactRef,
    pub upload: UploadResult,
}

pub struct Transformer {
    config: TransformConfig,
    raw_bucket: String,
    raw_key: String,
    processed_bucket: String,
    processed_key: String,
    store: Arc<dyn ObjectStore>,
}

impl Transformer {
    pub fn new(config: &PipelineConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config: config.transform.clone(),
            raw_bucket: config.storage.raw_bucket.clone(),
            raw_key: config.storage.raw_key.clone(),
            processed_bucket: config.storage.processed_bucket.clone(),
            processed_key: config.storage.processed_key.clone(),
            store,
        }
    }

    #[instrument(skip(self), fields(raw = %self.raw_key, processed = %self.processed_key))]
    pub async fn transform(&self) -> Result<TransformOutcome> {
        self.store.ensure_bucket(&self.processed_bucket).await?;

        info!("Reading data from the bronze layer...");
        let raw = self
            .store
            .get_object(&self.raw_bucket, &self.raw_key)
            .await
            .inspect_err(|e| {
                error!(
                    "Error reading from object storage. Does {} exist there? {}",
                    self.raw_key, e
                )
            })?;

        info!("Transforming {} compressed bytes...", raw.len());
        let text = extract_entry(&raw, &self.config.archive_entry)?;
        let records = parse_cnaes(&text)?;

        info!("- Rows processed: {}", records.len());
        if let Some(first) = records.first() {
            info!(
                "- Example: [{}, {}]",
                first.codigo_cnae,
                first.descricao_cnae.as_deref().unwrap_or("")
            );
        }

        let encoded = parquet_io::encode(&records)?;

        let local = &self.config.processed_path;
        if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local, &encoded).await?;
        info!("Converted to Parquet: {}", local.display());

        info!("Uploading to the silver layer");
        let upload = self
            .store
            .put_file(
                &self.processed_bucket,
                &self.processed_key,
                local,
                Some(PARQUET_CONTENT_TYPE),
            )
            .await?;

        let artifact = ArtifactRef::new(Tier::Silver, &self.processed_bucket, &self.processed_key);
        info!("Success! Available at: {}", artifact);

        Ok(TransformOutcome {
            rows: records.len(),
            sample: records.into_iter().next(),
            artifact,
            upload,
        })
    }
}

#[async_trait]
impl Stage for Transformer {
    fn name(&self) -> &'static str {
        "transform"
    }

    fn label(&self) -> &'static str {
        "Silver Transformation (Parquet)"
    }

    async fn run(&self) -> Result<StageOutcome> {
        self.transform().await.map(StageOutcome::Transformed)
    }
}

/// Pull the delimited text out of the zip archive
///
/// A single-file archive is read regardless of the entry name. With several
/// files, the one whose base name matches `entry` (ignoring case) is used.
pub fn extract_entry(data: &[u8], entry: &str) -> Result<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;

    let mut files = Vec::new();
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        if !file.is_dir() {
            files.push((i, file.name().to_string()));
        }
    }

    let index = match files.as_slice() {
        [] => return Err(StageError::Parse("archive contains no files".to_string())),
        [(i, _)] => *i,
        many => many
            .iter()
            .find(|(_, name)| {
                name.rsplit('/')
                    .next()
                    .is_some_and(|base| base.eq_ignore_ascii_case(entry))
            })
            .map(|(i, _)| *i)
            .ok_or_else(|| {
                StageError::Parse(format!(
                    "archive holds {} files and none is named '{}'",
                    many.len(),
                    entry
                ))
            })?,
    };

    let mut file = archive.by_index(index)?;
    debug!("Extracting {} ({} bytes)", file.name(), file.size());
    let mut contents = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Parse headerless `code;description` rows
///
/// Every row must have exactly two fields and a non-empty code. An empty
/// description becomes `None`.
pub fn parse_cnaes(data: &[u8]) -> Result<Vec<CnaeRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .quote(b'"')
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut records = Vec::new();
    for row in reader.byte_records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.len() != 2 {
            return Err(StageError::Parse(format!(
                "line {}: expected 2 fields, found {}",
                line,
                row.len()
            )));
        }

        let code = decode_latin1(&row[0]);
        if code.is_empty() {
            return Err(StageError::Parse(format!("line {}: empty CNAE code", line)));
        }

        let description = decode_latin1(&row[1]);
        records.push(CnaeRecord {
            codigo_cnae: code,
            descricao_cnae: (!description.is_empty()).then_some(description),
        });
    }

    Ok(records)
}

/// ISO-8859-1: every byte is the code point of the same value
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}
