//! Sequential stage runner
//!
//! Runs the bronze, silver, gold and optimize stages in order and stops at
//! the first failure.

use crate::config::PipelineConfig;
use crate::db;
use crate::error::PipelineError;
use crate::fetcher::Fetcher;
use crate::loader::Loader;
use crate::optimizer::Optimizer;
use crate::stage::{Stage, StageKind, StageOutcome};
use crate::storage::{ObjectStore, S3Store};
use crate::transformer::Transformer;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

const BANNER: &str = "==================================================";

#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: &'static str,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
    pub elapsed: Duration,
}

pub struct Orchestrator {
    stages: Vec<Box<dyn Stage>>,
}

impl Orchestrator {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Wire the four stages against S3 and PostgreSQL
    ///
    /// The database pool is lazy: a missing database surfaces as a failure
    /// of the load stage, after bronze and silver have run.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&config.storage));
        let pool = db::connect_lazy(&config.database);
        let stages = StageKind::ALL
            .iter()
            .map(|kind| build_stage(*kind, config, store.clone(), pool.clone()))
            .collect();
        Self::new(stages)
    }

    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        info!("{}", BANNER);
        info!("STARTING CNAE DATA PIPELINE");
        info!("{}", BANNER);

        let mut reports = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            reports.push(run_stage(stage.as_ref()).await?);
        }

        let elapsed = start.elapsed();
        info!("{}", BANNER);
        info!("PIPELINE FINISHED SUCCESSFULLY IN {:.2}s", elapsed.as_secs_f64());
        info!("{}", BANNER);

        Ok(RunReport {
            stages: reports,
            elapsed,
        })
    }
}

/// Run one stage with the same progress logging as a full run
pub async fn run_stage(stage: &dyn Stage) -> Result<StageReport, PipelineError> {
    info!("Starting step: {}...", stage.label());
    let start = Instant::now();

    match stage.run().await {
        Ok(outcome) => {
            let elapsed = start.elapsed();
            info!(
                "Step '{}' completed in {:.2}s ({})",
                stage.label(),
                elapsed.as_secs_f64(),
                outcome
            );
            Ok(StageReport {
                name: stage.name(),
                outcome,
                elapsed,
            })
        },
        Err(source) => {
            error!("Error executing step '{}': {}", stage.label(), source);
            Err(PipelineError::StageFailed {
                stage: stage.name(),
                source,
            })
        },
    }
}

/// Construct a single stage
pub fn build_stage(
    kind: StageKind,
    config: &PipelineConfig,
    store: Arc<dyn ObjectStore>,
    pool: PgPool,
) -> Box<dyn Stage> {
    match kind {
        StageKind::Fetch => Box::new(Fetcher::new(config, store)),
        StageKind::Transform => Box::new(Transformer::new(config, store)),
        StageKind::Load => Box::new(Loader::new(config, store, pool)),
        StageKind::Optimize => Box::new(Optimizer::new(config, pool)),
    }
}
