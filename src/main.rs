//! CLI entry point for festival-fetch.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use festival_fetch::{
    HttpClient, JobBuilder, ResolverSet, RunConfig, RunSummary, Scheduler, SubmissionRow,
    YtDlpExtractor, load_rows_json, load_sheet, write_report,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod config_runtime;
mod progress;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (args, cli_sources) = config_runtime::parse_cli_with_sources();

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
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = app_config::load_default_file_config()?;
    if let (Some(path), Some(_)) = (&loaded.path, &loaded.config) {
        info!(path = %path.display(), "loaded config file");
    }
    let config =
        config_runtime::build_run_config(&args, &cli_sources, loaded.config.as_ref())?;

    let summary = run(&args, config).await?;
    std::process::exit(summary.exit_outcome().code());
}

async fn run(args: &Args, config: RunConfig) -> Result<RunSummary> {
    info!(
        out = %config.output_root.display(),
        workers = config.workers,
        retries = config.max_retries,
        dry_run = config.dry_run,
        "festival-fetch starting"
    );

    let client = HttpClient::with_timeouts(config.connect_timeout, config.read_timeout)
        .context("Failed to build HTTP client")?;
    let rows = load_rows(args, &client).await?;
    info!(rows = rows.len(), "loaded submission rows");

    let build = JobBuilder::new(&config).build(&rows);
    for rejection in &build.rejected {
        warn!(
            index = rejection.index,
            row = ?rejection.row_number,
            reason = %rejection.reason,
            "row rejected"
        );
    }
    info!(
        jobs = build.jobs.len(),
        skipped = build.skipped.len(),
        rejected = build.rejected.len(),
        "built job plan"
    );

    let extractor = Arc::new(YtDlpExtractor::new(&config.extractor_program));
    let mut scheduler = Scheduler::new(&config, ResolverSet::new(client, extractor))?;
    let progress = progress::progress_hook(
        !args.quiet && io::stderr().is_terminal(),
        build.total(),
    );
    if let Some((_, hook)) = &progress {
        scheduler = scheduler.on_outcome(Arc::clone(hook));
    }

    let outcomes = scheduler.run(build).await;
    if let Some((bar, _)) = progress {
        bar.finish_and_clear();
    }

    if config.dry_run {
        info!(planned = outcomes.len(), "dry run complete; no report written");
    } else {
        let report_path = config.report_path();
        write_report(&report_path, &outcomes)
            .await
            .with_context(|| format!("Failed to write report '{}'", report_path.display()))?;
    }

    let summary = RunSummary::from_outcomes(&outcomes);
    print_summary(&summary, config.dry_run);
    Ok(summary)
}

async fn load_rows(args: &Args, client: &HttpClient) -> Result<Vec<SubmissionRow>> {
    if let Some(rows_path) = &args.rows {
        return load_rows_json(rows_path)
            .with_context(|| format!("Failed to load rows from '{}'", rows_path.display()));
    }
    let source = args.csv.as_deref().unwrap_or_default();
    load_sheet(source, client)
        .await
        .with_context(|| format!("Failed to load submission sheet '{source}'"))
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    if dry_run {
        println!(
            "Dry run: {} asset(s) planned, {} already present",
            summary.planned,
            summary.skipped_existing + summary.skipped_stub
        );
        return;
    }
    println!(
        "Done: {} downloaded, {} already present, {} stubbed, {} failed ({} total)",
        summary.downloaded,
        summary.skipped_existing,
        summary.skipped_stub,
        summary.failed,
        summary.total()
    );
}
