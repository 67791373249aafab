//! Jobs: one (film, asset kind, URL) unit of download work.
//!
//! Jobs are produced by [`JobBuilder`] and never mutated afterwards; the
//! scheduler shares them read-only across workers.

mod builder;
mod local;

pub use builder::{BuildOutput, JobBuilder, RowRejection};
pub use local::{FETCH_LEDGER, LocalEntry, LocalIndex, STUB_SUFFIX, record_fetched, write_stub};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kind of festival asset a URL delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    /// The screening copy.
    Film,
    /// Trailer or teaser.
    Trailer,
    /// Production still.
    Still,
    /// Poster artwork.
    Poster,
    /// Any other linked file.
    OtherHttp,
}

impl AssetKind {
    /// Stable identifier used in job ids and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Film => "film",
            Self::Trailer => "trailer",
            Self::Still => "still",
            Self::Poster => "poster",
            Self::OtherHttp => "other-http",
        }
    }

    /// Folder under the film directory that holds this kind.
    #[must_use]
    pub fn folder_name(self) -> &'static str {
        match self {
            Self::Film => "Film",
            Self::Trailer => "Trailer",
            Self::Still => "Stills",
            Self::Poster => "Posters",
            Self::OtherHttp => "Other",
        }
    }

    /// Label used inside file stems.
    #[must_use]
    pub fn stem_label(self) -> &'static str {
        match self {
            Self::OtherHttp => "other",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secret string that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret for handing to the one consumer that needs it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Credential material passed through, untouched, to the resolver that needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// Exported browser cookies (Netscape format).
    pub cookies_file: Option<PathBuf>,
    /// Password protecting the hosted video.
    pub password: Option<Secret>,
}

impl Credential {
    /// True when there is nothing to pass along.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies_file.is_none() && self.password.is_none()
    }
}

/// One unit of download work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Position in the run; outcomes are reported in this order.
    pub seq: usize,
    /// Stable identity, e.g. `Midnight Run::still#2`.
    pub id: String,
    /// Film name as submitted.
    pub film: String,
    /// Asset kind.
    pub kind: AssetKind,
    /// Source URL as submitted.
    pub url: String,
    /// Destination path without extension; unique within a run.
    pub dest_stem: PathBuf,
    /// Credential material for the resolver, if any.
    pub credential: Option<Credential>,
}

/// Formats a job identity from film, kind, and 1-based ordinal.
#[must_use]
pub fn job_id(film: &str, kind: AssetKind, ordinal: usize) -> String {
    if ordinal <= 1 {
        format!("{film}::{kind}")
    } else {
        format!("{film}::{kind}#{ordinal}")
    }
}
