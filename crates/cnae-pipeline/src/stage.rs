//! Uniform stage contract used by the orchestrator

use crate::error::Result;
use crate::fetcher::FetchOutcome;
use crate::loader::LoadOutcome;
use crate::optimizer::OptimizeOutcome;
use crate::transformer::TransformOutcome;
use async_trait::async_trait;

/// One unit of pipeline work
///
/// Stages share no in-memory state. Each reads what the previous stage left
/// in object storage or the database.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short machine name, e.g. `fetch`
    fn name(&self) -> &'static str;

    /// Human label used in progress logs
    fn label(&self) -> &'static str;

    async fn run(&self) -> Result<StageOutcome>;
}

/// What a stage produced
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Fetched(FetchOutcome),
    Transformed(TransformOutcome),
    Loaded(LoadOutcome),
    Optimized(OptimizeOutcome),
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageOutcome::Fetched(o) => write!(
                f,
                "uploaded {} bytes to s3://{}/{} (from {})",
                o.upload.size, o.upload.bucket, o.upload.key, o.source
            ),
            StageOutcome::Transformed(o) => write!(
                f,
                "{} rows written to s3://{}/{}",
                o.rows, o.upload.bucket, o.upload.key
            ),
            StageOutcome::Loaded(o) => write!(f, "{} rows loaded into {}", o.rows, o.table),
            StageOutcome::Optimized(o) => {
                let applied = o.steps.iter().filter(|s| s.status.is_applied()).count();
                write!(f, "{}/{} DDL steps applied", applied, o.steps.len())
            },
        }
    }
}

/// Stage selector for running one stage on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StageKind {
    Fetch,
    Transform,
    Load,
    Optimize,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Fetch,
        StageKind::Transform,
        StageKind::Load,
        StageKind::Optimize,
    ];
}
