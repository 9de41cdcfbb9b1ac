//! Build automation tasks for the CNAE pipeline

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for the CNAE pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<cnae_pipeline::cli::Cli>();

    let content = format!(
        r#"# cnae-pipeline CLI Reference

Generated from the clap definitions on {}.

## Quick Start

```bash
# Start MinIO and PostgreSQL, then fill in .env
cp .env.example .env

# Full run: fetch, transform, load, optimize
cnae-pipeline

# A single stage
cnae-pipeline stage transform

# Connection test and dashboard queries
cnae-pipeline check-db
cnae-pipeline query sectors --limit 5
cnae-pipeline query search software
```

## Commands

{}

## Environment Variables

Every setting has a default except credentials. See `.env.example` for the
full list; the most common are:

- `MINIO_ROOT_USER`, `MINIO_ROOT_PASSWORD` - object storage credentials
- `S3_ENDPOINT` - object storage endpoint (default: `http://localhost:9000`)
- `POSTGRES_USER`, `POSTGRES_PASSWORD`, `POSTGRES_DB`, `POSTGRES_HOST`, `POSTGRES_PORT`
- `LOG_LEVEL`, `LOG_FORMAT`, `LOG_OUTPUT` - logging (`RUST_LOG` directives also apply)

---

*To update, run `cargo run -p xtask -- generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
