//! dropwatch - directory ingestion service
//!
//! This binary provides the command-line interface for the pipeline.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dropwatch::logging::init_logging;
use dropwatch::Pipeline;
use dropwatch_core::Config;
use dropwatch_storage::create_record_store;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dropwatch")]
#[command(about = "Watch a directory and record line counts of arriving files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the directory and process files until Ctrl+C (default)
    Run,
    /// Print record counts from the database
    Stats,
    /// Validate and print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Held until exit so the file writer flushes
    let _log_guard = init_logging(&config.logging, cli.verbose)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Stats => print_stats(&config).await,
        Commands::CheckConfig => print_config(&config),
    }
}

/// Run the pipeline until Ctrl+C
async fn run(config: Config) -> Result<()> {
    info!(
        "Starting dropwatch {} for {}",
        dropwatch_core::VERSION,
        config.watcher.watch_path.display()
    );

    let mut pipeline = Pipeline::start(&config).await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, initiating graceful shutdown (press again to skip draining)");

    let abort = pipeline.drain_abort_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second Ctrl+C, abandoning queued files");
            abort.cancel();
        }
    });

    pipeline.shutdown().await
}

/// Print the same counts as `GET /stats`
async fn print_stats(config: &Config) -> Result<()> {
    let store = create_record_store(&config.storage)
        .await
        .context("Failed to open record store")?;
    let counts = store.counts().await?;

    // Nothing is queued when the service is not running in this process
    let stats = serde_json::json!({
        "total": counts.total,
        "ok": counts.ok,
        "failed": counts.failed,
        "queued": 0,
    });
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn print_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}
