//! sharepoint-utils - flatten a document library and download its files
//!
//! Entry point for the CLI application.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sharepoint_utils::config::{CliArgs, Command, DownloadArgs, FlattenArgs};
use sharepoint_utils::{
    read_tree, write_tree, ChromeSession, DownloadConfig, Downloader, FlattenConfig, RetryConfig,
    TreeWalker,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    match args.command {
        Command::Flatten(flatten) => run_flatten(&args.output_dir, flatten)
            .await
            .context("Flatten failed"),
        Command::Download(download) => run_download(&args.output_dir, download)
            .await
            .context("Download failed"),
    }
}

async fn run_flatten(output_dir: &std::path::Path, args: FlattenArgs) -> Result<()> {
    let config = FlattenConfig::from_args(output_dir, args).context("Invalid configuration")?;

    let mut session = tokio::task::block_in_place(|| {
        ChromeSession::launch(&config.start_url, &config.auth_token)
    })
    .context("Failed to start browser")?;

    let report = TreeWalker::new(&config).walk(&mut session).await?;
    if report.halted {
        warn!(
            skipped = report.folders_skipped,
            "Traversal stopped at the depth bound; the tree is partial"
        );
    }

    let root = report.tree.to_item();
    write_tree(&config.output_path, &root)
        .await
        .with_context(|| format!("Failed to write {}", config.output_path.display()))?;

    info!(
        folders = root.folder_count(),
        files = root.file_count(),
        visited = report.folders_visited,
        output = %config.output_path.display(),
        "Flatten completed"
    );
    Ok(())
}

async fn run_download(output_dir: &std::path::Path, args: DownloadArgs) -> Result<()> {
    let config = DownloadConfig::from_args(output_dir, args).context("Invalid configuration")?;

    let root = read_tree(&config.input_path)
        .await
        .with_context(|| format!("Failed to read {}", config.input_path.display()))?;

    let retry = RetryConfig {
        max_attempts: config.max_attempts,
        ..RetryConfig::default()
    };
    let downloader = Downloader::new(&config.auth_token, retry, config.concurrency);
    let report = downloader.download_tree(&root, &config.output_dir).await?;

    info!(
        files = report.files,
        folders = report.folders,
        bytes = report.bytes,
        "Download completed"
    );
    Ok(())
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sharepoint_utils=debug,warn")
    } else {
        EnvFilter::new("sharepoint_utils=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
