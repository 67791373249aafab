//! Merges built-in defaults, the config file and command-line flags into a
//! [`RunConfig`]. Flags given on the command line always win.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};

use festival_fetch::{AssetFilter, RunConfig};

use crate::app_config::FileConfig;
use crate::cli::Args;

/// Output root when neither the command line nor the config file names one.
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "downloads";

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Which overridable flags were typed on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) workers: bool,
    pub(crate) retries: bool,
    pub(crate) min_existing_mb: bool,
    pub(crate) stub_failures: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (args, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        workers: is_commandline_value(matches, "workers"),
        retries: is_commandline_value(matches, "retries"),
        min_existing_mb: is_commandline_value(matches, "min_existing_mb"),
        stub_failures: is_commandline_value(matches, "stub_failures"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Builds and validates the run configuration.
pub(crate) fn build_run_config(
    args: &Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Result<RunConfig> {
    let file = file_config.cloned().unwrap_or_default();

    let output_root = args
        .output_dir
        .clone()
        .or(file.output_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let mut config = RunConfig::new(output_root);

    config.workers = usize::from(pick(cli_sources.workers, args.workers, file.workers));
    config.max_retries = u32::from(pick(cli_sources.retries, args.retries, file.retries));
    let min_existing_mb = pick(
        cli_sources.min_existing_mb,
        args.min_existing_mb,
        file.min_existing_mb,
    );
    config.min_existing_bytes = min_existing_mb.saturating_mul(BYTES_PER_MIB);
    config.stub_unobtainable = pick(
        cli_sources.stub_failures,
        args.stub_failures,
        file.stub_failures,
    );

    config.dry_run = args.dry_run;
    config.filter = AssetFilter {
        films_only: args.films_only,
        include_stills: args.include_stills,
        include_poster: args.include_poster,
        include_all_http: args.include_all_http,
    };
    config.cookies_file = args.cookies.clone().or(file.cookies);
    if let Some(extractor) = args.extractor.clone().or(file.extractor) {
        config.extractor_program = extractor;
    }
    if let Some(secs) = file.connect_timeout_secs {
        config.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.read_timeout_secs {
        config.read_timeout = Duration::from_secs(secs);
    }
    config.report_path.clone_from(&args.report);

    config.validate().context("Invalid run configuration")?;
    Ok(config)
}

fn pick<T>(from_cli: bool, cli_value: T, file_value: Option<T>) -> T {
    if from_cli {
        cli_value
    } else {
        file_value.unwrap_or(cli_value)
    }
}
