//! CSV run report: one row per outcome, in sequence order.
//!
//! Formatting is locale-independent and stable so reports diff cleanly
//! across runs; only the `elapsed_secs` column changes between identical runs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::outcome::JobOutcome;
use crate::submission::csv::format_record;

/// Report columns, in order.
pub const REPORT_COLUMNS: [&str; 13] = [
    "seq",
    "identity",
    "film",
    "asset_kind",
    "status",
    "strategy",
    "source_url",
    "resolved_url",
    "final_path",
    "error_kind",
    "error_detail",
    "attempts",
    "elapsed_secs",
];

/// Errors writing the report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem failure.
    #[error("cannot write report {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Renders outcomes as CSV text, header included, sorted by sequence index.
#[must_use]
pub fn render_report(outcomes: &[JobOutcome]) -> String {
    let mut sorted: Vec<&JobOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|outcome| outcome.seq);

    let mut out = format_record(&REPORT_COLUMNS);
    out.push('\n');
    for outcome in sorted {
        let (error_kind, error_detail) = outcome
            .failure
            .as_ref()
            .map(|f| (f.kind.as_str(), single_line(&f.detail)))
            .unwrap_or_default();
        let fields = [
            outcome.seq.to_string(),
            outcome.id.clone(),
            outcome.film.clone(),
            outcome.kind.as_str().to_string(),
            outcome.status.as_str().to_string(),
            outcome.strategy.as_str().to_string(),
            outcome.source_url.clone(),
            outcome.resolved_url.clone().unwrap_or_default(),
            outcome
                .final_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            error_kind.to_string(),
            error_detail,
            outcome.attempts.to_string(),
            format!("{:.3}", outcome.elapsed.as_secs_f64()),
        ];
        out.push_str(&format_record(&fields));
        out.push('\n');
    }
    out
}

fn single_line(detail: &str) -> String {
    detail
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Writes the report to `path` through a temporary sibling and a rename.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the directory, file, or rename fails.
pub async fn write_report(path: &Path, outcomes: &[JobOutcome]) -> Result<PathBuf, ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, render_report(outcomes))
        .await
        .map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;

    info!(path = %path.display(), rows = outcomes.len(), "wrote report");
    Ok(path.to_path_buf())
}
