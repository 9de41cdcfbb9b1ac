//! DDL pass over the freshly loaded gold table
//!
//! Each step is an intent that may already hold: a step failing with one of
//! its known "already applied" SQLSTATEs is reported and skipped. Anything
//! else is a real failure. All steps are attempted either way, each in its
//! own transaction.

use crate::config::PipelineConfig;
use crate::db::quote_ident;
use crate::error::{Result, StageError};
use crate::stage::{Stage, StageOutcome};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};

pub const TABLE_COMMENT: &str =
    "Dimension Table: Brazilian National Classification of Economic Activities";

/// `invalid_table_definition`, raised for "multiple primary keys for table"
pub const SQLSTATE_MULTIPLE_PRIMARY_KEYS: &str = "42P16";

/// One idempotent schema change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStep {
    pub name: &'static str,
    pub sql: String,
    /// SQLSTATE codes meaning the change is already in place
    pub already_applied: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlStatus {
    Applied,
    AlreadyApplied(String),
    Failed(String),
}

impl DdlStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, DdlStatus::Applied | DdlStatus::AlreadyApplied(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlReport {
    pub step: &'static str,
    pub status: DdlStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeOutcome {
    pub steps: Vec<DdlReport>,
}

/// The ordered schema changes for `table`
pub fn ddl_steps(table: &str) -> Vec<DdlStep> {
    let table = quote_ident(table);
    vec![
        DdlStep {
            name: "set_not_null",
            sql: format!("ALTER TABLE {} ALTER COLUMN codigo_cnae SET NOT NULL", table),
            already_applied: &[],
        },
        DdlStep {
            name: "add_primary_key",
            sql: format!("ALTER TABLE {} ADD PRIMARY KEY (codigo_cnae)", table),
            already_applied: &[SQLSTATE_MULTIPLE_PRIMARY_KEYS],
        },
        DdlStep {
            name: "comment_table",
            sql: format!(
                "COMMENT ON TABLE {} IS '{}'",
                table,
                TABLE_COMMENT.replace('\'', "''")
            ),
            already_applied: &[],
        },
    ]
}

/// Decide what a failed step means from its SQLSTATE
pub fn classify_failure(step: &DdlStep, sqlstate: Option<&str>, message: String) -> DdlStatus {
    match sqlstate {
        Some(code) if step.already_applied.contains(&code) => DdlStatus::AlreadyApplied(message),
        _ => DdlStatus::Failed(message),
    }
}

pub struct Optimizer {
    table: String,
    db: PgPool,
}

impl Optimizer {
    pub fn new(config: &PipelineConfig, db: PgPool) -> Self {
        Self {
            table: config.database.table.clone(),
            db,
        }
    }

    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn optimize(&self) -> Result<OptimizeOutcome> {
        info!("Optimizing gold tables...");

        let mut reports = Vec::new();
        for step in ddl_steps(&self.table) {
            let status = match self.apply(&step).await {
                Ok(()) => {
                    info!("Executed {}: {}", step.name, step.sql);
                    DdlStatus::Applied
                },
                Err(e) => {
                    let sqlstate = e
                        .as_database_error()
                        .and_then(|d| d.code())
                        .map(|c| c.into_owned());
                    let status = classify_failure(&step, sqlstate.as_deref(), e.to_string());
                    match &status {
                        DdlStatus::AlreadyApplied(msg) => {
                            warn!("Step {} already applied: {}", step.name, msg)
                        },
                        DdlStatus::Failed(msg) => error!("Step {} failed: {}", step.name, msg),
                        DdlStatus::Applied => {},
                    }
                    status
                },
            };
            reports.push(DdlReport {
                step: step.name,
                status,
            });
        }

        let failed: Vec<String> = reports
            .iter()
            .filter(|r| matches!(r.status, DdlStatus::Failed(_)))
            .map(|r| r.step.to_string())
            .collect();

        if !failed.is_empty() {
            return Err(StageError::Ddl(failed));
        }

        info!("Optimization complete.");
        Ok(OptimizeOutcome { steps: reports })
    }

    async fn apply(&self, step: &DdlStep) -> std::result::Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;
        sqlx::query(&step.sql).execute(&mut *tx).await?;
        tx.commit().await
    }
}

#[async_trait]
impl Stage for Optimizer {
    fn name(&self) -> &'static str {
        "optimize"
    }

    fn label(&self) -> &'static str {
        "Database Optimization (DDL)"
    }

    async fn run(&self) -> Result<StageOutcome> {
        self.optimize().await.map(StageOutcome::Optimized)
    }
}
