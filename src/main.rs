//! cog-inspect - Inspect Cloud Optimized GeoTIFFs over range requests.
//!
//! This binary parses the command line, opens the requested TIFFs and prints
//! reports or writes tiles.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cog_inspect::{
    config::{Cli, Command, InfoConfig, SourceConfig, TileConfig},
    io::open_reader,
    report::{DocumentReport, ReportOptions},
    CogTiff,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Info(config) => run_info(config).await,
        Command::Tile(config) => run_tile(config).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "cog_inspect=debug"
    } else {
        "cog_inspect=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open a TIFF at `location` with the chunking and store options given.
async fn open(location: &str, config: &SourceConfig) -> Result<CogTiff, String> {
    let reader = open_reader(location, &config.store_options())
        .await
        .map_err(|e| format!("{location}: {e}"))?;
    CogTiff::open(reader, config.chunk_config())
        .await
        .map_err(|e| format!("{location}: {e}"))
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(config: InfoConfig) -> ExitCode {
    init_logging(config.source.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let options = ReportOptions {
        tags: config.tags || config.fetch_tags,
        fetch_tags: config.fetch_tags,
        tile_stats: config.tile_stats,
    };

    let mut reports = Vec::with_capacity(config.paths.len());
    let mut failed = false;
    for path in &config.paths {
        match inspect(path, &config.source, options).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("{}", e);
                failed = true;
            }
        }
    }

    if config.json {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        let text: Vec<String> = reports.iter().map(DocumentReport::to_text).collect();
        print!("{}", text.join("\n"));
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn inspect(
    path: &str,
    config: &SourceConfig,
    options: ReportOptions,
) -> Result<DocumentReport, String> {
    let tiff = open(path, config).await?;
    let report = DocumentReport::build(&tiff, options)
        .await
        .map_err(|e| format!("{path}: {e}"))?;

    if let Err(e) = tiff.close().await {
        error!("{}: failed to close: {}", path, e);
    }
    Ok(report)
}

// =============================================================================
// Tile Command
// =============================================================================

async fn run_tile(config: TileConfig) -> ExitCode {
    init_logging(config.source.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let tiff = match open(&config.path, &config.source).await {
        Ok(tiff) => tiff,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let address = config.xyz;
    let tile = match tiff.tile(address.x, address.y, address.z).await {
        Ok(tile) => tile,
        Err(e) => {
            error!("Failed to read tile {},{},{}: {}", address.x, address.y, address.z, e);
            return ExitCode::FAILURE;
        }
    };

    if tile.is_empty() {
        info!(
            "Tile {},{},{} is sparse, nothing written",
            address.x, address.y, address.z
        );
        return ExitCode::SUCCESS;
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.output).await {
        error!("Failed to create {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    let target = config
        .output
        .join(address.file_name(tile.compression.extension()));
    if let Err(e) = tokio::fs::write(&target, &tile.bytes).await {
        error!("Failed to write {}: {}", target.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "Wrote {} ({} bytes, {})",
        target.display(),
        tile.bytes.len(),
        tile.mime_type
    );

    if let Err(e) = tiff.close().await {
        error!("Failed to close {}: {}", config.path, e);
    }
    ExitCode::SUCCESS
}
