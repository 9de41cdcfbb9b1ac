//! Shared helpers for the pipeline integration tests
//!
//! Object storage is always the in-process [`MemoryStore`]. Tests that need
//! PostgreSQL start a throwaway container through [`TestPostgres`] and are
//! marked `#[ignore = "requires Docker"]`.

#![allow(dead_code)]

use anyhow::{Context, Result};
use cnae_pipeline::config::PipelineConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;
use zip::write::SimpleFileOptions;

pub const SOURCE_PATH: &str = "/CNPJ/Cnaes.zip";

/// Two real rows, one with a leading zero
pub const SAMPLE_ROWS: &[(&str, &str)] = &[
    ("0111301", "Cultivo de arroz"),
    ("6201501", "Desenvolvimento de programas de computador sob encomenda"),
];

// ============================================================================
// Configuration
// ============================================================================

/// Configuration rooted in `dir`, downloading from `server_uri`
pub fn test_config(dir: &Path, server_uri: &str) -> PipelineConfig {
    test_config_with(dir, server_uri, &[])
}

/// [`test_config`] with extra environment keys applied on top
pub fn test_config_with(
    dir: &Path,
    server_uri: &str,
    overrides: &[(&str, &str)],
) -> PipelineConfig {
    let cache = dir.join("raw").join("Cnaes.zip");
    let processed = dir.join("processed").join("cnaes.parquet");
    let mut env: HashMap<&str, String> = [
        ("CNAE_SOURCE_URL", format!("{}{}", server_uri, SOURCE_PATH)),
        ("CNAE_CACHE_PATH", cache.display().to_string()),
        ("CNAE_PROCESSED_PATH", processed.display().to_string()),
        ("CNAE_DOWNLOAD_TIMEOUT_SECS", "5".to_string()),
        ("MINIO_ROOT_USER", "minioadmin".to_string()),
        ("MINIO_ROOT_PASSWORD", "minioadmin".to_string()),
        ("POSTGRES_USER", "postgres".to_string()),
        ("POSTGRES_PASSWORD", "postgres".to_string()),
        ("POSTGRES_DB", "postgres".to_string()),
    ]
    .into_iter()
    .collect();
    for (key, value) in overrides {
        env.insert(key, value.to_string());
    }

    PipelineConfig::from_lookup(|key| env.get(key).cloned())
        .unwrap_or_else(|e| panic!("test configuration is invalid: {}", e))
}

// ============================================================================
// Fixtures
// ============================================================================

/// `"code";"description"` lines, latin-1 encoded, CRLF terminated
pub fn cnae_csv(rows: &[(&str, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (code, description) in rows {
        let line = format!("\"{}\";\"{}\"\r\n", code, description);
        out.extend(
            line.chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')),
        );
    }
    out
}

/// Single-entry zip archive shaped like the Receita Federal download
pub fn cnae_zip(rows: &[(&str, &str)]) -> Vec<u8> {
    zip_with_entry("F.K03200$Z.D40111.CNAECSV", &cnae_csv(rows))
}

pub fn zip_with_entry(name: &str, body: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(name, SimpleFileOptions::default())
        .expect("start zip entry");
    writer.write_all(body).expect("write zip entry");
    writer.finish().expect("finish zip").into_inner()
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&format!("postgresql://postgres:postgres@{}:{}/postgres", host, port))
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}

/// Rows of the gold table ordered by code
pub async fn table_rows(pool: &PgPool, table: &str) -> Vec<(String, Option<String>)> {
    sqlx::query_as(&format!(
        "SELECT codigo_cnae, descricao_cnae FROM \"{}\" ORDER BY codigo_cnae",
        table
    ))
    .fetch_all(pool)
    .await
    .expect("select gold rows")
}
