//! Festival Fetch Library
//!
//! Download orchestration for film-festival submissions: takes the links
//! submitters put in a sheet (Google Drive, Dropbox, plain HTTP, Vimeo and
//! YouTube), fetches them into a fixed folder layout with resumable transfers
//! and bounded concurrency, and records one outcome per asset.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`submission`] - Submission sheets and JSON rows
//! - [`job`] - Job building, destination layout and local idempotence checks
//! - [`link`] - Pure link classification
//! - [`resolver`] - Turning links into fetch plans (Drive interstitial, extractor)
//! - [`download`] - HTTP probing, resumable transfers and retry policy
//! - [`scheduler`] - Worker pool and per-job state machine
//! - [`report`] - CSV outcome report
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use festival_fetch::{
//!     HttpClient, JobBuilder, ResolverSet, RunConfig, Scheduler, YtDlpExtractor, rows_from_csv,
//!     write_report,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::new("./festival");
//! let rows = rows_from_csv(&std::fs::read_to_string("submissions.csv")?)?;
//! let build = JobBuilder::new(&config).build(&rows);
//!
//! let client = HttpClient::with_timeouts(config.connect_timeout, config.read_timeout)?;
//! let extractor = Arc::new(YtDlpExtractor::new(&config.extractor_program));
//! let scheduler = Scheduler::new(&config, ResolverSet::new(client, extractor))?;
//! let outcomes = scheduler.run(build).await;
//! write_report(&config.report_path(), &outcomes).await?;
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod job;
pub mod link;
pub mod outcome;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod submission;
mod user_agent;

// Re-export commonly used types
pub use config::{AssetFilter, ConfigError, RunConfig};
pub use download::{FetchTarget, HttpClient, RetryPolicy, TransferError};
pub use job::{AssetKind, BuildOutput, Job, JobBuilder};
pub use link::{Link, Strategy, classify};
pub use outcome::{ExitOutcome, FailureKind, JobOutcome, OutcomeStatus, RunSummary};
pub use report::{render_report, write_report};
pub use resolver::{
    Extractor, ExtractorRequest, GoogleDriveResolver, ResolutionPlan, ResolveError, ResolverSet,
    YtDlpExtractor,
};
pub use scheduler::{OutcomeHook, Scheduler};
pub use submission::{SubmissionError, SubmissionRow, load_rows_json, load_sheet, rows_from_csv};
