//! Gold stage: full-replace load of the silver Parquet into PostgreSQL
//!
//! Every run drops and recreates the table. There is no merge and no run
//! identifier: the table always holds exactly the latest silver artifact.
//! Constraints are added afterwards by the optimizer.

use crate::config::PipelineConfig;
use crate::db::quote_ident;
use crate::error::Result;
use crate::parquet_io;
use crate::stage::{Stage, StageOutcome};
use crate::storage::ObjectStore;
use async_trait::async_trait;
use cnae_common::CnaeRecord;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Rows per INSERT statement (two bind parameters each)
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub table: String,
    pub rows: u64,
}

pub struct Loader {
    bucket: String,
    key: String,
    table: String,
    store: Arc<dyn ObjectStore>,
    db: PgPool,
}

impl Loader {
    pub fn new(config: &PipelineConfig, store: Arc<dyn ObjectStore>, db: PgPool) -> Self {
        Self {
            bucket: config.storage.processed_bucket.clone(),
            key: config.storage.processed_key.clone(),
            table: config.database.table.clone(),
            store,
            db,
        }
    }

    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn load(&self) -> Result<LoadOutcome> {
        info!("Downloading {} from the silver layer...", self.key);
        let data = self
            .store
            .get_object(&self.bucket, &self.key)
            .await
            .inspect_err(|e| error!("Error reading from object storage: {}", e))?;

        let records = parquet_io::decode(data)?;
        info!("Rows loaded: {}", records.len());

        info!("Writing data to the '{}' table...", self.table);
        let rows = replace_table(&self.db, &self.table, &records, DEFAULT_INSERT_CHUNK_SIZE)
            .await
            .inspect_err(|e| error!("Database error: {}", e))?;

        info!("Success! Gold layer load completed.");
        Ok(LoadOutcome {
            table: self.table.clone(),
            rows,
        })
    }
}

#[async_trait]
impl Stage for Loader {
    fn name(&self) -> &'static str {
        "load"
    }

    fn label(&self) -> &'static str {
        "Gold Load (Postgres)"
    }

    async fn run(&self) -> Result<StageOutcome> {
        self.load().await.map(StageOutcome::Loaded)
    }
}

/// Drop, recreate and fill `table` in one transaction
///
/// Readers see either the previous contents or the complete new ones.
pub async fn replace_table(
    db: &PgPool,
    table: &str,
    records: &[CnaeRecord],
    chunk_size: usize,
) -> Result<u64> {
    let table = quote_ident(table);
    let mut tx = db.begin().await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
        .execute(&mut *tx)
        .await?;

    sqlx::query(&format!(
        "CREATE TABLE {} (codigo_cnae TEXT, descricao_cnae TEXT)",
        table
    ))
    .execute(&mut *tx)
    .await?;

    let mut inserted = 0u64;
    for chunk in records.chunks(chunk_size.max(1)) {
        inserted += insert_chunk(&mut tx, &table, chunk).await?;
    }

    tx.commit().await?;
    debug!("Replaced {} with {} rows", table, inserted);
    Ok(inserted)
}

async fn insert_chunk(
    tx: &mut Transaction<'_, Postgres>,
    quoted_table: &str,
    chunk: &[CnaeRecord],
) -> Result<u64> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} (codigo_cnae, descricao_cnae) ",
        quoted_table
    ));

    query_builder.push_values(chunk, |mut b, record| {
        b.push_bind(&record.codigo_cnae)
            .push_bind(&record.descricao_cnae);
    });

    let result = query_builder.build().execute(&mut **tx).await?;
    Ok(result.rows_affected())
}
