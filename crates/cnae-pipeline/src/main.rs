//! CNAE Pipeline - Main entry point

use anyhow::{Context, Result};
use cnae_common::logging::{init_logging, LogConfig, LogOutput};
use cnae_pipeline::cli::{Cli, Commands, QueryCommand};
use cnae_pipeline::config::PipelineConfig;
use cnae_pipeline::orchestrator::{self, Orchestrator};
use cnae_pipeline::storage::{ObjectStore, S3Store};
use cnae_pipeline::{db, queries};
use clap::Parser;
use std::env;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    // `.env` has to be loaded before LOG_* is read
    dotenvy::dotenv().ok();

    let log_config = cli.log_config(|key| env::var(key).ok()).unwrap_or_else(|e| {
        eprintln!("Ignoring invalid logging environment: {:#}", e);
        LogConfig::builder().output(LogOutput::Console).build()
    });

    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Logging disabled: {:#}", e);
            None
        },
    };

    if let Err(e) = execute(&cli).await {
        error!("{:#}", e);
        if cli.resolved_command().runs_pipeline() {
            error!("Pipeline was stopped due to errors.");
        }
        process::exit(1);
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    let config = PipelineConfig::from_env().context("Invalid configuration")?;

    match cli.resolved_command() {
        Commands::Run => {
            let report = Orchestrator::from_config(&config).run().await?;
            info!(
                "{} steps completed in {:.2}s",
                report.stages.len(),
                report.elapsed.as_secs_f64()
            );
        },

        Commands::Stage { stage } => {
            let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&config.storage));
            let pool = db::connect_lazy(&config.database);
            let stage = orchestrator::build_stage(stage, &config, store, pool);
            orchestrator::run_stage(stage.as_ref()).await?;
        },

        Commands::CheckDb => {
            let pool = db::connect(&config.database).await?;
            db::check_connection(&pool).await?;
        },

        Commands::Query { command } => {
            let pool = db::connect(&config.database).await?;
            let table = &config.database.table;
            match command {
                QueryCommand::Total => {
                    let total = queries::total_cnaes(&pool, table).await?;
                    println!("Total registered activities: {}", total);
                },
                QueryCommand::Sectors { limit } => {
                    let rows = queries::cnaes_by_sector(&pool, table, limit).await?;
                    print!("{}", queries::format_sectors(&rows));
                },
                QueryCommand::Search { keyword, limit } => {
                    let rows = queries::search_cnaes(&pool, table, &keyword, limit).await?;
                    if rows.is_empty() {
                        println!("No activity matches '{}'", keyword);
                    } else {
                        print!("{}", queries::format_records(&rows));
                    }
                },
            }
        },
    }

    Ok(())
}
