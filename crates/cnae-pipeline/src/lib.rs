//! CNAE Pipeline Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Batch ETL for the Receita Federal CNAE reference table (economic activity
//! classification codes).
//!
//! # Stages
//!
//! 1. **Fetcher** (bronze): download `Cnaes.zip`, or reuse a local copy, and
//!    upload it to the raw bucket.
//! 2. **Transformer** (silver): unzip and parse the `;`-delimited latin-1 text
//!    and write it back as Snappy-compressed Parquet to the processed bucket.
//! 3. **Loader** (gold): full-replace load of the Parquet rows into a
//!    PostgreSQL table.
//! 4. **Optimizer**: NOT NULL, primary key and table comment, tolerant of
//!    being applied twice.
//!
//! The [`orchestrator::Orchestrator`] runs the stages in that order and stops
//! at the first failure. Stages share nothing in memory; each reads the
//! previous stage's artifact from object storage or the database.
//!
//! # Example
//!
//! ```no_run
//! use cnae_pipeline::{config::PipelineConfig, orchestrator::Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_env()?;
//!     let report = Orchestrator::from_config(&config).run().await?;
//!     tracing::info!("Finished in {:.2}s", report.elapsed.as_secs_f64());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod optimizer;
pub mod orchestrator;
pub mod parquet_io;
pub mod queries;
pub mod stage;
pub mod storage;
pub mod transformer;

pub use error::{PipelineError, Result, StageError};
pub use stage::{Stage, StageOutcome};
