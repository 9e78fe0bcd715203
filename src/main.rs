// src/main.rs
// =============================================================================
// Entry point of the site-mapper CLI.
//
// What happens here:
// 1. Set up logging (tracing, filtered by RUST_LOG, default "info")
// 2. Parse command-line arguments using clap
// 3. Build a run config, start the extraction and relay its progress
// 4. Print a summary and exit (0 = success, 2 = error, 130 = interrupted)
//
// Ctrl-C cancels the run's token: the in-flight page is abandoned, the
// renderer is closed and nothing half-written is left behind.
//
// Rust concepts:
// - #[tokio::main]: turns async main into a runtime + block_on
// - anyhow::Result for the top level, typed errors (thiserror) below it
// - tokio::spawn for the progress relay and the Ctrl-C watcher
// =============================================================================

mod cli;
mod config;
mod crawl;
mod discover;
mod error;
mod extract;
mod fetch;
mod output;
mod progress;
mod structure;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands, CrawlArgs};
use config::{ExtractConfig, RunRequest};
use crawl::KeyPolicy;
use error::ExtractError;
use extract::{Mode, RunSummary};
use fetch::HttpRenderer;
use progress::ProgressEvent;

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    // stdout carries only the run summary; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Structure { url, crawl } => handle_extract(&url, crawl, Mode::Structure).await,
        Commands::Map { url, crawl } => handle_extract(&url, crawl, Mode::Map).await,
        Commands::Rerender { index, output } => handle_rerender(&index, output).await,
    }
}

fn build_config(url: &str, args: &CrawlArgs) -> Result<ExtractConfig, ExtractError> {
    let config = RunRequest::new(url)
        .with_max_depth(args.depth)
        .validate()?
        .with_output_dir(&args.out)
        .with_fetch_timeout(Duration::from_secs(args.fetch_timeout))
        .with_sitemap_timeout(Duration::from_secs(args.sitemap_timeout))
        .with_user_agent(&args.user_agent)
        .with_key_policy(if args.keep_query {
            KeyPolicy::KeepQuery
        } else {
            KeyPolicy::StripQuery
        });

    Ok(args
        .deny_hosts
        .iter()
        .fold(config, |config, host| config.with_deny_host(host)))
}

async fn handle_extract(url: &str, args: CrawlArgs, mode: Mode) -> Result<i32> {
    let config = build_config(url, &args)?;

    // The listener is up before anything can fail, renderer start-up included
    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(relay_progress(rx));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping extraction");
            on_interrupt.cancel();
        }
    });

    let result = extract::launch(config, mode, Some(tx), cancel, |config| {
        HttpRenderer::new(&config.user_agent)
    })
    .await;

    watcher.abort();
    // The run dropped its sender, so the relay drains and ends
    let _ = reporter.await;

    match result {
        Ok(summary) => {
            print_summary(&summary, args.json)?;
            Ok(EXIT_OK)
        }
        Err(ExtractError::Cancelled) => {
            eprintln!("⏹️  Extraction cancelled, no output written");
            Ok(EXIT_INTERRUPTED)
        }
        Err(e) => Err(e.into()),
    }
}

async fn relay_progress(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = rx.recv().await {
        tracing::info!(
            phase = ?event.phase,
            percentage = event.percentage,
            "{}",
            event.message
        );
    }
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("✅ Extraction complete: {}", summary.base_url);
    println!("   📄 Pages discovered: {}", summary.total_discovered);
    println!("   🔎 Source: {:?}", summary.source);
    println!("   📊 Max depth: {}", summary.max_depth);
    if summary.crawl.recorded > 0 || summary.crawl.failed > 0 {
        println!(
            "   🕸️  Crawl: {} recorded, {} failed, {} duplicates, {} loops skipped",
            summary.crawl.recorded,
            summary.crawl.failed,
            summary.crawl.duplicates,
            summary.crawl.loops
        );
    }
    println!("   💾 Index: {}", summary.artifacts.index.display());
    println!("   🌳 Tree:  {}", summary.artifacts.document.display());
    Ok(())
}

async fn handle_rerender(index_path: &Path, output: Option<PathBuf>) -> Result<i32> {
    let index = output::read_index(index_path).await?;
    let (_, document_name) = output::file_names(&index.structure);
    let target = output.unwrap_or_else(|| index_path.with_file_name(document_name));

    tokio::fs::write(&target, output::render_index(&index))
        .await
        .with_context(|| format!("failed to write {}", target.display()))?;

    println!("🌳 Wrote {}", target.display());
    Ok(EXIT_OK)
}
