//! Pipeline configuration
//!
//! One [`PipelineConfig`] is built at process start and handed to every
//! stage. Nothing below the binary reads the environment on its own.

use crate::error::StageError;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Receita Federal open-data location of the CNAE table.
pub const DEFAULT_SOURCE_URL: &str = "http://dadosabertos.rfb.gov.br/CNPJ/Cnaes.zip";

pub const DEFAULT_CACHE_PATH: &str = "data/raw/Cnaes.zip";

pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// The source server rejects clients that do not look like a browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_DOWNLOAD_CHUNK_SIZE: usize = 8192;

pub const DEFAULT_S3_ENDPOINT: &str = "http://localhost:9000";

pub const DEFAULT_S3_REGION: &str = "us-east-1";

pub const DEFAULT_RAW_BUCKET: &str = "raw-data";

pub const DEFAULT_PROCESSED_BUCKET: &str = "silver-data";

pub const DEFAULT_RAW_KEY: &str = "Cnaes.zip";

pub const DEFAULT_PROCESSED_KEY: &str = "cnaes.parquet";

pub const DEFAULT_ARCHIVE_ENTRY: &str = "Cnaes.csv";

pub const DEFAULT_PROCESSED_PATH: &str = "data/processed/cnaes.parquet";

/// The pipeline runs outside the database container, so it connects locally.
pub const DEFAULT_DATABASE_HOST: &str = "localhost";

pub const DEFAULT_DATABASE_PORT: u16 = 5432;

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 2;

pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_TABLE: &str = "dim_cnaes";

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub transform: TransformConfig,
    pub database: DatabaseConfig,
}

/// Where the raw archive comes from
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub url: String,
    /// A file already at this path is uploaded instead of downloading
    pub cache_path: PathBuf,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// The government server's certificate chain does not validate
    pub accept_invalid_certs: bool,
    pub chunk_size: usize,
}

/// S3-compatible object storage
#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
    pub raw_bucket: String,
    pub processed_bucket: String,
    pub raw_key: String,
    pub processed_key: String,
}

/// Bronze to silver conversion settings
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Entry to read when the archive holds more than one file
    pub archive_entry: String,
    /// Local copy of the Parquet file written before upload
    pub processed_path: PathBuf,
}

/// PostgreSQL connection and target table
#[derive(Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub table: String,
}

impl PipelineConfig {
    /// Load configuration from `.env` (if present) and the process environment
    pub fn from_env() -> Result<Self, StageError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup, applying defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let secret = |primary: &str, fallback: &str| {
            lookup(primary).or_else(|| lookup(fallback)).unwrap_or_default()
        };

        let config = Self {
            source: SourceConfig {
                url: get("CNAE_SOURCE_URL", DEFAULT_SOURCE_URL),
                cache_path: PathBuf::from(get("CNAE_CACHE_PATH", DEFAULT_CACHE_PATH)),
                timeout_secs: parse_or(
                    &lookup,
                    "CNAE_DOWNLOAD_TIMEOUT_SECS",
                    DEFAULT_DOWNLOAD_TIMEOUT_SECS,
                )?,
                user_agent: get("CNAE_USER_AGENT", DEFAULT_USER_AGENT),
                accept_invalid_certs: parse_or(&lookup, "CNAE_ACCEPT_INVALID_CERTS", true)?,
                chunk_size: parse_or(
                    &lookup,
                    "CNAE_DOWNLOAD_CHUNK_SIZE",
                    DEFAULT_DOWNLOAD_CHUNK_SIZE,
                )?,
            },
            storage: StorageConfig {
                endpoint: Some(get("S3_ENDPOINT", DEFAULT_S3_ENDPOINT)).filter(|e| !e.is_empty()),
                region: get("S3_REGION", DEFAULT_S3_REGION),
                access_key: secret("MINIO_ROOT_USER", "S3_ACCESS_KEY"),
                secret_key: secret("MINIO_ROOT_PASSWORD", "S3_SECRET_KEY"),
                path_style: parse_or(&lookup, "S3_PATH_STYLE", true)?,
                raw_bucket: get("CNAE_RAW_BUCKET", DEFAULT_RAW_BUCKET),
                processed_bucket: get("CNAE_PROCESSED_BUCKET", DEFAULT_PROCESSED_BUCKET),
                raw_key: get("CNAE_RAW_KEY", DEFAULT_RAW_KEY),
                processed_key: get("CNAE_PROCESSED_KEY", DEFAULT_PROCESSED_KEY),
            },
            transform: TransformConfig {
                archive_entry: get("CNAE_ARCHIVE_ENTRY", DEFAULT_ARCHIVE_ENTRY),
                processed_path: PathBuf::from(get("CNAE_PROCESSED_PATH", DEFAULT_PROCESSED_PATH)),
            },
            database: DatabaseConfig {
                user: lookup("POSTGRES_USER").unwrap_or_default(),
                password: lookup("POSTGRES_PASSWORD").unwrap_or_default(),
                host: get("POSTGRES_HOST", DEFAULT_DATABASE_HOST),
                port: parse_or(&lookup, "POSTGRES_PORT", DEFAULT_DATABASE_PORT)?,
                name: lookup("POSTGRES_DB").unwrap_or_default(),
                max_connections: parse_or(
                    &lookup,
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                )?,
                connect_timeout_secs: parse_or(
                    &lookup,
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                )?,
                table: get("CNAE_TABLE", DEFAULT_TABLE),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// Missing credentials only warn: the first remote call reports the
    /// authentication failure.
    pub fn validate(&self) -> Result<(), StageError> {
        let required = [
            ("CNAE_SOURCE_URL", self.source.url.as_str()),
            ("CNAE_RAW_BUCKET", self.storage.raw_bucket.as_str()),
            ("CNAE_PROCESSED_BUCKET", self.storage.processed_bucket.as_str()),
            ("CNAE_RAW_KEY", self.storage.raw_key.as_str()),
            ("CNAE_PROCESSED_KEY", self.storage.processed_key.as_str()),
            ("CNAE_ARCHIVE_ENTRY", self.transform.archive_entry.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(StageError::Config(format!("{} cannot be empty", name)));
            }
        }

        if self.source.timeout_secs == 0 {
            return Err(StageError::Config(
                "CNAE_DOWNLOAD_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.source.chunk_size == 0 {
            return Err(StageError::Config(
                "CNAE_DOWNLOAD_CHUNK_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(StageError::Config(
                "DATABASE_MAX_CONNECTIONS must be greater than 0".to_string(),
            ));
        }

        if !is_plain_identifier(&self.database.table) {
            return Err(StageError::Config(format!(
                "CNAE_TABLE '{}' must be a plain SQL identifier ([A-Za-z_][A-Za-z0-9_]*)",
                self.database.table
            )));
        }

        if self.storage.access_key.is_empty() || self.storage.secret_key.is_empty() {
            tracing::warn!("Object storage credentials are not set (MINIO_ROOT_USER / MINIO_ROOT_PASSWORD)");
        }

        if self.database.user.is_empty() || self.database.name.is_empty() {
            tracing::warn!("Database credentials are not set (POSTGRES_USER / POSTGRES_DB)");
        }

        Ok(())
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("path_style", &self.path_style)
            .field("raw_bucket", &self.raw_bucket)
            .field("processed_bucket", &self.processed_bucket)
            .field("raw_key", &self.raw_key)
            .field("processed_key", &self.processed_key)
            .finish()
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .field("table", &self.table)
            .finish()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, StageError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| StageError::Config(format!("{} has an invalid value: '{}'", key, raw))),
        None => Ok(default),
    }
}

/// True for identifiers that need no quoting beyond the usual double quotes
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
