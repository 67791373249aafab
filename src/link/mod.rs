//! Link classification: maps a submitted URL to the strategy that can fetch it.
//!
//! [`classify`] is pure and total. Every input string yields a [`Link`], and
//! anything that is not an `http(s)` URL lands in [`Link::Unknown`] rather than
//! an error. Provider-specific normalization happens here so that resolvers
//! only ever see canonical forms:
//!
//! - Google Drive share links (`open?id=`, `file/d/<id>/`, `uc?id=`) collapse to
//!   `https://drive.google.com/uc?export=download&id=<id>`.
//! - Dropbox share links always carry `dl=1`.
//! - A fixed allow-list of streaming hosts is routed to the external extractor.

pub(crate) mod utils;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use utils::{canonical_host, compile_static_regex, host_matches_domain};

/// Streaming hosts handed to the external extractor (subdomains included).
pub const STREAMING_DOMAINS: [&str; 3] = ["vimeo.com", "youtube.com", "youtu.be"];

const DRIVE_CANONICAL_BASE: &str = "https://drive.google.com/uc";

static DRIVE_FILE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/file/(?:u/\d+/)?d/([A-Za-z0-9_-]{10,})"));

static DRIVE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^[A-Za-z0-9_-]{10,}$"));

/// Fetch strategy selected for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Plain HTTP(S) fetch.
    DirectHttp,
    /// Google Drive file share.
    GoogleDrive,
    /// Dropbox share link.
    Dropbox,
    /// Delegated to the external streaming extractor.
    StreamingExtractor,
    /// Not fetchable by any strategy.
    Unknown,
}

impl Strategy {
    /// Stable identifier used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectHttp => "direct-http",
            Self::GoogleDrive => "google-drive",
            Self::Dropbox => "dropbox",
            Self::StreamingExtractor => "streaming-extractor",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a link could not be mapped to a fetch strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownReason {
    /// The string does not parse as an absolute URL with a host.
    Unparseable,
    /// The URL uses a scheme other than http/https.
    UnsupportedScheme(String),
}

/// A classified link together with its normalized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Any http(s) URL that no provider rule claims.
    DirectHttp {
        /// URL to probe and fetch.
        url: Url,
    },
    /// Google Drive share link.
    GoogleDrive {
        /// File id, when one could be extracted.
        file_id: Option<String>,
        /// The submitted URL.
        original: String,
    },
    /// Dropbox share link rewritten for direct download.
    Dropbox {
        /// Share URL with `dl=1` forced.
        url: Url,
    },
    /// Streaming page URL for the external extractor.
    Streaming {
        /// Page URL as submitted.
        url: Url,
    },
    /// Not fetchable.
    Unknown {
        /// The submitted string.
        raw: String,
        /// Why classification gave up.
        reason: UnknownReason,
    },
}

impl Link {
    /// Strategy tag for this link.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::DirectHttp { .. } => Strategy::DirectHttp,
            Self::GoogleDrive { .. } => Strategy::GoogleDrive,
            Self::Dropbox { .. } => Strategy::Dropbox,
            Self::Streaming { .. } => Strategy::StreamingExtractor,
            Self::Unknown { .. } => Strategy::Unknown,
        }
    }

    /// The normalized URL a resolver starts from, if there is one.
    #[must_use]
    pub fn normalized_url(&self) -> Option<String> {
        match self {
            Self::DirectHttp { url } | Self::Dropbox { url } | Self::Streaming { url } => {
                Some(url.to_string())
            }
            Self::GoogleDrive { file_id, .. } => file_id.as_deref().map(drive_canonical_url),
            Self::Unknown { .. } => None,
        }
    }
}

/// Canonical direct-download URL for a Google Drive file id.
#[must_use]
pub fn drive_canonical_url(file_id: &str) -> String {
    format!("{DRIVE_CANONICAL_BASE}?export=download&id={file_id}")
}

/// Classifies a URL string. Never fails and performs no I/O.
#[must_use]
pub fn classify(raw: &str) -> Link {
    let trimmed = raw.trim();
    let Ok(url) = Url::parse(trimmed) else {
        return Link::Unknown {
            raw: trimmed.to_string(),
            reason: UnknownReason::Unparseable,
        };
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Link::Unknown {
            raw: trimmed.to_string(),
            reason: UnknownReason::UnsupportedScheme(url.scheme().to_string()),
        };
    }

    let Some(host) = url.host_str().map(canonical_host) else {
        return Link::Unknown {
            raw: trimmed.to_string(),
            reason: UnknownReason::Unparseable,
        };
    };

    if is_drive_link(&host, &url) {
        return Link::GoogleDrive {
            file_id: extract_drive_file_id(&url),
            original: trimmed.to_string(),
        };
    }

    if host_matches_domain(&host, "dropbox.com") {
        return Link::Dropbox {
            url: force_dropbox_download(url),
        };
    }

    if STREAMING_DOMAINS
        .iter()
        .any(|domain| host_matches_domain(&host, domain))
    {
        return Link::Streaming { url };
    }

    Link::DirectHttp { url }
}

fn is_drive_link(host: &str, url: &Url) -> bool {
    match host {
        "drive.google.com" | "drive.usercontent.google.com" => true,
        // docs.google.com also serves Docs/Sheets editors; only file-share paths count.
        "docs.google.com" => {
            let path = url.path();
            path.starts_with("/uc") || path.starts_with("/open") || path.contains("/file/")
        }
        _ => false,
    }
}

fn extract_drive_file_id(url: &Url) -> Option<String> {
    if let Some(caps) = DRIVE_FILE_PATH_RE.captures(url.path()) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| DRIVE_ID_RE.is_match(id))
}

fn force_dropbox_download(mut url: Url) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "dl")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("dl", "1");
    url
}
