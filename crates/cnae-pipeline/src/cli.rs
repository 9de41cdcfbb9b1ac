//! Command-line definitions

use crate::queries::{DEFAULT_SEARCH_LIMIT, DEFAULT_SECTOR_LIMIT};
use crate::stage::StageKind;
use clap::{Parser, Subcommand};
use cnae_common::logging::{LogConfig, LogLevel, LogOutput};

/// CNAE Pipeline - bronze, silver and gold ETL for the CNAE reference table
#[derive(Parser, Debug)]
#[command(name = "cnae-pipeline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the CLI reference as markdown and exit
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run every stage in order: fetch, transform, load, optimize
    Run,

    /// Run a single stage
    Stage {
        #[arg(value_enum)]
        stage: StageKind,
    },

    /// Test the database connection
    CheckDb,

    /// Read-only queries against the gold table
    Query {
        #[command(subcommand)]
        command: QueryCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum QueryCommand {
    /// Count registered activities
    Total,

    /// Activity count per two-digit sector prefix
    Sectors {
        #[arg(short, long, default_value_t = DEFAULT_SECTOR_LIMIT)]
        limit: i64,
    },

    /// Search descriptions by keyword (case-insensitive)
    Search {
        keyword: String,

        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: i64,
    },
}

impl Cli {
    /// The requested command, `run` when none was given
    pub fn resolved_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    /// Console logging at the level implied by `--verbose`, with `LOG_*`
    /// keys from `lookup` taking precedence
    pub fn log_config<F>(&self, lookup: F) -> anyhow::Result<LogConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        LogConfig::builder()
            .level(if self.verbose {
                LogLevel::Debug
            } else {
                LogLevel::Info
            })
            .output(LogOutput::Console)
            .log_file_prefix("cnae-pipeline")
            .build()
            .merge_lookup(lookup)
    }
}

impl Commands {
    /// Whether this command executes pipeline stages
    pub fn runs_pipeline(&self) -> bool {
        matches!(self, Commands::Run | Commands::Stage { .. })
    }
}
