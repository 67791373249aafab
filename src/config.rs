//! Immutable run configuration threaded through the builder and scheduler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::download::DEFAULT_MAX_RETRIES;
use crate::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::job::AssetKind;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Maximum number of concurrent workers.
pub const MAX_WORKERS: usize = 32;

/// Maximum configurable retries per job.
pub const MAX_RETRIES: u32 = 10;

/// Existing final files at or below this size are not trusted as complete (10 MiB).
pub const DEFAULT_MIN_EXISTING_BYTES: u64 = 10 * 1024 * 1024;

/// Default report file name under the output root.
pub const REPORT_FILE_NAME: &str = "download_report.csv";

/// Default external extractor program.
pub const DEFAULT_EXTRACTOR: &str = "yt-dlp";

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Worker count outside 1..=32.
    #[error("invalid worker count {0}: expected 1..=32")]
    Workers(usize),

    /// Retry count above the ceiling.
    #[error("invalid retry count {0}: expected 0..=10")]
    Retries(u32),

    /// A zero timeout would fail every request.
    #[error("invalid {field}: timeouts must be greater than zero")]
    ZeroTimeout {
        /// Offending field.
        field: &'static str,
    },
}

/// Which asset kinds become jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetFilter {
    /// Skip trailers; only films (plus explicitly included kinds).
    pub films_only: bool,
    /// Fetch stills.
    pub include_stills: bool,
    /// Fetch posters.
    pub include_poster: bool,
    /// Fetch every linked asset regardless of kind.
    pub include_all_http: bool,
}

impl AssetFilter {
    /// Returns true if assets of `kind` should be fetched.
    #[must_use]
    pub fn admits(&self, kind: AssetKind) -> bool {
        let admitted = match kind {
            AssetKind::Film => true,
            AssetKind::Trailer => !self.films_only,
            AssetKind::Still => self.include_stills,
            AssetKind::Poster => self.include_poster,
            AssetKind::OtherHttp => false,
        };
        admitted || self.include_all_http
    }
}

/// Everything a run needs to know, fixed before the first job is built.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root of the output tree.
    pub output_root: PathBuf,
    /// Concurrent workers (1..=32).
    pub workers: usize,
    /// Retries after the first attempt (0..=10).
    pub max_retries: u32,
    /// Base backoff between attempts.
    pub retry_base_delay: Duration,
    /// Upper bound of random jitter added to each backoff.
    pub retry_max_jitter: Duration,
    /// Log the plan without touching the network.
    pub dry_run: bool,
    /// Inclusion filters.
    pub filter: AssetFilter,
    /// Existing final files must be larger than this to count as complete.
    pub min_existing_bytes: u64,
    /// Write a `.stub` for links that can never be fetched.
    pub stub_unobtainable: bool,
    /// Cookies file handed to the extractor.
    pub cookies_file: Option<PathBuf>,
    /// Extractor program name or path.
    pub extractor_program: PathBuf,
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// HTTP per-read timeout.
    pub read_timeout: Duration,
    /// Explicit report path; defaults to `<output_root>/download_report.csv`.
    pub report_path: Option<PathBuf>,
}

impl RunConfig {
    /// Default configuration rooted at `output_root`.
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_secs(1),
            retry_max_jitter: Duration::from_millis(500),
            dry_run: false,
            filter: AssetFilter::default(),
            min_existing_bytes: DEFAULT_MIN_EXISTING_BYTES,
            stub_unobtainable: false,
            cookies_file: None,
            extractor_program: PathBuf::from(DEFAULT_EXTRACTOR),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            report_path: None,
        }
    }

    /// Checks ranges; call before handing the config to a scheduler.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::Workers(self.workers));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(ConfigError::Retries(self.max_retries));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                field: "connect timeout",
            });
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                field: "read timeout",
            });
        }
        Ok(())
    }

    /// Where the report goes.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| self.output_root.join(REPORT_FILE_NAME))
    }

    /// Output root as a path.
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}
