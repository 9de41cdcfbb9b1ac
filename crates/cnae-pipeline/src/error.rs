//! Error types for the pipeline stages

use crate::storage::StorageError;
use thiserror::Error;

/// Result type for stage operations
pub type Result<T> = std::result::Result<T, StageError>;

/// Failure of a single stage
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Columnar format error: {0}")]
    Columnar(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("DDL failed for step(s): {}", .0.join(", "))]
    Ddl(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for StageError {
    fn from(err: csv::Error) -> Self {
        StageError::Parse(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for StageError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        StageError::Columnar(err.to_string())
    }
}

impl From<arrow_schema::ArrowError> for StageError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        StageError::Columnar(err.to_string())
    }
}

/// Failure of a whole pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Step '{stage}' failed: {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::StageFailed { stage, .. } => stage,
        }
    }
}
