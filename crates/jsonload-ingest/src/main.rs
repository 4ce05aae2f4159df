//! jsonload-ingest - load JSON-array files into a database table

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jsonload_common::logging::{init_logging, LogConfig, LogLevel};
use jsonload_ingest::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use jsonload_ingest::config::{ConfigOverrides, IngestConfig};
use jsonload_ingest::coordinator::{plan_work, IngestionCoordinator};
use jsonload_ingest::schema::ConflictPolicy;
use jsonload_ingest::types::{OutcomeStatus, RunReport};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "jsonload-ingest")]
#[command(author, version, about = "Checkpointed bulk loader for JSON-array files")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory scanned for source files
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,

    /// File extension to load, without the dot
    #[arg(long, global = true)]
    extension: Option<String>,

    /// Target table name
    #[arg(long, global = true)]
    table: Option<String>,

    /// Number of concurrent workers
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Checkpoint database file
    #[arg(long, global = true)]
    checkpoint: Option<PathBuf>,

    /// Target database URL (postgresql://... or sqlite:...)
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Config file (TOML, INI, ...)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Replace existing rows instead of keeping the first write
    #[arg(long, global = true)]
    overwrite: bool,

    /// List the files that would be loaded without loading them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every file not yet checkpointed (default)
    Run,

    /// Show checkpoint count and files still pending
    Status,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            source_dir: self.source_dir.clone(),
            extension: self.extension.clone(),
            table: self.table.clone(),
            workers: self.workers,
            checkpoint_path: self.checkpoint.clone(),
            database_url: self.database_url.clone(),
            conflict_policy: self.overwrite.then_some(ConflictPolicy::Overwrite),
            dry_run: self.dry_run.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("jsonload-ingest")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid logging environment: {}", e);
            return ExitCode::FAILURE;
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        },
    };

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Run aborted");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = IngestConfig::load(cli.config.as_deref(), &cli.overrides())?;

    let checkpoints = Arc::new(
        SqliteCheckpointStore::open(&config.checkpoint_path)
            .await
            .with_context(|| {
                format!("Failed to open checkpoint store '{}'", config.checkpoint_path.display())
            })?,
    );

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let report = IngestionCoordinator::connect_and_run(&config, checkpoints).await?;
            print_report(&report);
        },
        Command::Status => {
            let checkpointed = checkpoints.len().await?;
            let plan = plan_work(&config.source_dir, &config.extension, checkpoints.as_ref()).await?;

            info!(checkpointed, pending = plan.pending.len(), "Status");
            println!("Checkpointed files: {}", checkpointed);
            println!("Candidate files:    {}", plan.candidates);
            println!("Pending files:      {}", plan.pending.len());
            for unit in &plan.pending {
                println!("  {}", unit.identifier);
            }
        },
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    if report.dry_run {
        println!(
            "Dry run: {} of {} files would be loaded ({} already checkpointed)",
            report.pending.len(),
            report.candidates,
            report.skipped
        );
        for identifier in &report.pending {
            println!("  {}", identifier);
        }
        return;
    }

    println!(
        "Loaded {} files, {} failed, {} contended, {} not checkpointed ({} skipped, {:.1}s)",
        report.loaded(),
        report.failed(),
        report.contended(),
        report.checkpoint_failed(),
        report.skipped,
        report.duration().as_secs_f64()
    );
    println!("Records: {}, rows written: {}", report.records(), report.rows_written());

    for outcome in report.outcomes.iter().filter(|o| o.status != OutcomeStatus::Loaded) {
        println!(
            "  {} [{}] {}",
            outcome.identifier,
            outcome.status.as_str(),
            outcome.error.as_deref().unwrap_or("")
        );
    }
}
