//! CLI entry point for the uploader tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use uploader_core::config::{FileConfig, load_config};
use uploader_core::db::{Database, DatabaseOptions};
use uploader_core::destination::{DestinationId, DirectoryDestination};
use uploader_core::download::{CONNECT_TIMEOUT_SECS, HttpDownloader, READ_TIMEOUT_SECS};
use uploader_core::index::SqliteIndexSink;
use uploader_core::manifest::ManifestSource;
use uploader_core::params::{DEFAULT_CREDIT, DEFAULT_PROMPT_TIMEOUT, DEFAULT_WATERMARK};
use uploader_core::pipeline::{BatchRunner, Pacer, RunServices, RunSettings};
use uploader_core::report::DEFAULT_PAGE_BUDGET;

mod cli;
mod console;
mod progress;

use cli::Args;
use console::ConsoleEventSource;
use progress::ProgressObserver;

const DEFAULT_DATA_DIR: &str = "uploader-data";
const DATABASE_FILE: &str = "uploader.db";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = load_config(args.config.as_deref())?;
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, "configuration loaded");
    }
    let config = loaded.config;

    let data_dir = args
        .data_dir
        .clone()
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let destination_root = args
        .destination_root
        .clone()
        .or_else(|| config.destination_root.clone())
        .unwrap_or_else(|| data_dir.join("destinations"));
    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("Failed to create data directory '{}'", data_dir.display()))?;

    let manifest = read_manifest(&args.manifest).await?;
    let initial = DestinationId(args.chat);
    info!(manifest = %manifest.name, chat = %initial, "uploader starting");

    let destination = DirectoryDestination::new(&destination_root);
    destination
        .ensure_container(initial)
        .await
        .context("Failed to prepare the initial chat")?;

    let services = build_services(&config, &data_dir, destination).await?;
    let settings = build_settings(&args, &config, &data_dir);

    let mut events = if args.non_interactive {
        ConsoleEventSource::closed()
    } else {
        ConsoleEventSource::interactive()
    };

    let runner = BatchRunner::new(services, settings)
        .with_observer(Arc::new(ProgressObserver::new(!args.quiet)));
    let result = runner.run(&manifest, initial, &mut events).await?;

    info!(
        batch = %result.batch_name,
        destination = %result.destination_id,
        sent = result.sent_count,
        failed = result.failed_count,
        total = result.total_links,
        snapshot = %result.snapshot_path.display(),
        "Upload complete"
    );

    Ok(())
}

async fn read_manifest(path: &Path) -> Result<ManifestSource> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read manifest '{}'", path.display()))?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(ManifestSource::new(name, text))
}

async fn build_services(
    config: &FileConfig,
    data_dir: &Path,
    destination: DirectoryDestination,
) -> Result<RunServices> {
    let downloader = HttpDownloader::with_timeouts(
        data_dir.join("work"),
        config
            .download_connect_timeout_secs
            .unwrap_or(CONNECT_TIMEOUT_SECS),
        config
            .download_read_timeout_secs
            .unwrap_or(READ_TIMEOUT_SECS),
    )
    .context("Failed to build the HTTP client")?;

    let defaults = DatabaseOptions::default();
    let options = DatabaseOptions {
        max_connections: config
            .db_max_connections
            .unwrap_or(defaults.max_connections),
        busy_timeout_ms: config
            .db_busy_timeout_ms
            .unwrap_or(defaults.busy_timeout_ms),
    };
    let db_path = data_dir.join(DATABASE_FILE);
    let db = Database::new_with_options(&db_path, options)
        .await
        .with_context(|| format!("Failed to open database '{}'", db_path.display()))?;

    Ok(RunServices {
        downloader: Arc::new(downloader),
        destination: Arc::new(destination),
        durable_sink: Arc::new(SqliteIndexSink::new(db)),
        pacer: Arc::new(Pacer::new(config.item_delay())),
    })
}

fn build_settings(args: &Args, config: &FileConfig, data_dir: &Path) -> RunSettings {
    RunSettings {
        prompt_timeout: args
            .prompt_timeout
            .or(config.prompt_timeout_secs)
            .map_or(DEFAULT_PROMPT_TIMEOUT, Duration::from_secs),
        page_budget: config.page_budget.unwrap_or(DEFAULT_PAGE_BUDGET),
        default_credit: config
            .default_credit
            .clone()
            .unwrap_or_else(|| DEFAULT_CREDIT.to_string()),
        default_watermark: config
            .default_watermark
            .clone()
            .unwrap_or_else(|| DEFAULT_WATERMARK.to_string()),
        snapshot_dir: data_dir.to_path_buf(),
        retry_policy: config.retry_policy(),
    }
}
