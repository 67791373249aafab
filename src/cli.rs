//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use festival_fetch::config::DEFAULT_WORKERS;
use festival_fetch::download::DEFAULT_MAX_RETRIES;

/// Bulk-fetch festival submission assets.
///
/// Reads the links submitters left in a festival sheet (Google Drive, Dropbox,
/// Vimeo, YouTube or plain HTTP) and downloads them into one folder per film.
#[derive(Parser, Debug)]
#[command(name = "festival-fetch")]
#[command(author, version, about)]
#[command(group(ArgGroup::new("input").required(true).args(["csv", "rows"])))]
pub struct Args {
    /// Submission sheet: a CSV file, a Google Sheets link, or a bare sheet id
    #[arg(long, value_name = "PATH|URL")]
    pub csv: Option<String>,

    /// JSON file of already-mapped submission rows
    #[arg(long, value_name = "PATH")]
    pub rows: Option<PathBuf>,

    /// Output root (default: config file `output_dir`, else ./downloads)
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Concurrent downloads (1-32)
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub workers: u8,

    /// Retries per asset after the first attempt (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub retries: u8,

    /// Also fetch stills
    #[arg(long)]
    pub include_stills: bool,

    /// Also fetch posters
    #[arg(long)]
    pub include_poster: bool,

    /// Fetch every linked asset, whatever its column
    #[arg(long)]
    pub include_all_http: bool,

    /// Skip trailers
    #[arg(long)]
    pub films_only: bool,

    /// Build and log the plan without downloading anything
    #[arg(long)]
    pub dry_run: bool,

    /// Netscape cookies file handed to the streaming extractor
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Streaming extractor program (default: yt-dlp)
    #[arg(long, value_name = "PROGRAM")]
    pub extractor: Option<PathBuf>,

    /// Existing files at or below this size (MiB) are fetched again
    #[arg(long, value_name = "MB", default_value_t = 10)]
    pub min_existing_mb: u64,

    /// Leave a .stub file for links that can never be fetched
    #[arg(long)]
    pub stub_failures: bool,

    /// Report path (default: <out>/download_report.csv)
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_csv_input_uses_defaults() {
        let args = Args::try_parse_from(["festival-fetch", "--csv", "sheet.csv"]).unwrap();
        assert_eq!(args.csv.as_deref(), Some("sheet.csv"));
        assert_eq!(args.rows, None);
        assert_eq!(args.workers, 4);
        assert_eq!(args.retries, 2);
        assert_eq!(args.min_existing_mb, 10);
        assert!(!args.dry_run);
        assert!(!args.stub_failures);
    }

    #[test]
    fn test_cli_requires_one_input() {
        let err = Args::try_parse_from(["festival-fetch"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_inputs_conflict() {
        let err = Args::try_parse_from(["festival-fetch", "--csv", "a.csv", "--rows", "b.json"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_worker_range_enforced() {
        let args =
            Args::try_parse_from(["festival-fetch", "--rows", "r.json", "-w", "32"]).unwrap();
        assert_eq!(args.workers, 32);

        for bad in ["0", "33"] {
            let err = Args::try_parse_from(["festival-fetch", "--rows", "r.json", "-w", bad])
                .unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_retry_range_enforced() {
        let args =
            Args::try_parse_from(["festival-fetch", "--rows", "r.json", "--retries", "0"]).unwrap();
        assert_eq!(args.retries, 0);
        let err = Args::try_parse_from(["festival-fetch", "--rows", "r.json", "-r", "11"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_filter_and_output_flags() {
        let args = Args::try_parse_from([
            "festival-fetch",
            "--csv",
            "https://docs.google.com/spreadsheets/d/abc/edit",
            "-o",
            "/srv/festival",
            "--include-stills",
            "--include-poster",
            "--films-only",
            "--stub-failures",
            "--report",
            "/tmp/report.csv",
        ])
        .unwrap();
        assert_eq!(args.output_dir, Some(PathBuf::from("/srv/festival")));
        assert!(args.include_stills);
        assert!(args.include_poster);
        assert!(!args.include_all_http);
        assert!(args.films_only);
        assert!(args.stub_failures);
        assert_eq!(args.report, Some(PathBuf::from("/tmp/report.csv")));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["festival-fetch", "--rows", "r.json", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let err = Args::try_parse_from(["festival-fetch", "--rows", "r.json", "-q", "-v"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["festival-fetch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["festival-fetch", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_unknown_flag_returns_error() {
        let err = Args::try_parse_from(["festival-fetch", "--rows", "r.json", "--browser", "chrome"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
