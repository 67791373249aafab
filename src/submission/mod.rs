//! Submission input: the rows the job builder turns into jobs.
//!
//! Rows come from a festival submission sheet (a local CSV export or a Google
//! Sheets link fetched as CSV) or from a JSON file of already-mapped rows.
//!
//! # Example
//!
//! ```
//! use festival_fetch::submission::rows_from_csv;
//!
//! let rows = rows_from_csv("Film Name,Trailer\nMidnight Run,https://x.example/t.mp4\n")?;
//! assert_eq!(rows[0].film_name, "Midnight Run");
//! assert_eq!(rows[0].assets.len(), 1);
//! # Ok::<(), festival_fetch::submission::SubmissionError>(())
//! ```

pub mod csv;
mod sheet;

pub use sheet::{
    ColumnClass, asset_kind_for, classify_column, extract_password, extract_urls,
    is_google_sheet_link, rows_from_csv, sheet_export_url,
};

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::download::{HttpClient, TransferError};
use crate::job::{AssetKind, Secret};

/// Errors raised while loading submission rows.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// A quoted CSV field was never closed.
    #[error("unterminated quoted field starting on line {line}")]
    UnterminatedQuote {
        /// 1-based line of the opening quote.
        line: usize,
    },

    /// The sheet has no header row.
    #[error("submission sheet is empty: expected a header row")]
    MissingHeader,

    /// The rows file is not valid JSON for `SubmissionRow`.
    #[error("invalid rows file {path}: {source}")]
    Json {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Reading the input file failed.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Fetching a Google Sheets export failed.
    #[error("cannot fetch submission sheet: {0}")]
    Fetch(#[source] TransferError),
}

/// One linked asset within a submission row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetRef {
    /// What the link delivers.
    pub kind: AssetKind,
    /// The link as submitted.
    pub url: String,
    /// Password written next to the link, if any.
    #[serde(default)]
    pub password: Option<Secret>,
}

/// One parsed submission: a film and its linked assets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmissionRow {
    /// Line in the source sheet, for log messages.
    #[serde(default)]
    pub row_number: Option<usize>,
    /// Film name; blank names are rejected by the job builder.
    #[serde(default)]
    pub film_name: String,
    /// Linked assets in submission order.
    #[serde(default)]
    pub assets: Vec<AssetRef>,
}

/// Loads rows from a JSON array of [`SubmissionRow`] values.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_rows_json(path: &Path) -> Result<Vec<SubmissionRow>, SubmissionError> {
    let text = std::fs::read_to_string(path).map_err(|source| SubmissionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows: Vec<SubmissionRow> =
        serde_json::from_str(&text).map_err(|source| SubmissionError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), rows = rows.len(), "loaded submission rows");
    Ok(rows)
}

/// Loads rows from a local CSV export or a Google Sheets link.
///
/// # Errors
///
/// Returns an error if the sheet cannot be read, fetched, or parsed.
pub async fn load_sheet(
    source: &str,
    client: &HttpClient,
) -> Result<Vec<SubmissionRow>, SubmissionError> {
    let text = if is_google_sheet_link(source) {
        let export_url = sheet_export_url(source);
        info!(url = %export_url, "fetching submission sheet");
        client
            .get_text(&export_url)
            .await
            .map_err(SubmissionError::Fetch)?
    } else {
        let path = Path::new(source);
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SubmissionError::Io {
                path: path.to_path_buf(),
                source,
            })?
    };
    rows_from_csv(&text)
}
