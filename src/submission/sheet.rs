//! Festival submission sheets: column classification and URL harvesting.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::csv::{Record, parse_records};
use super::{AssetRef, SubmissionError, SubmissionRow};
use crate::job::{AssetKind, Secret};
use crate::link::utils::compile_static_regex;

/// Header phrases that mark the screening-copy column.
const FILM_KEYWORDS: [&str; 7] = [
    "link and password to download your film",
    "download your film",
    "festivaldelivery",
    "film delivery",
    "film download",
    "link to download your film",
    "link and password",
];
const TRAILER_KEYWORDS: [&str; 2] = ["trailer", "teaser"];
const STILL_KEYWORDS: [&str; 1] = ["still"];
const POSTER_KEYWORDS: [&str; 1] = ["poster"];

/// Accepted film-name headers, in priority order.
const FILM_NAME_HEADERS: [&str; 2] = ["film name", "film"];

static HTTP_URL_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"https?://[^\s]+"));

static PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)(?:password|pw|pass)\s*[:=\-]?\s*([\w!@#$%^&*()+\-]+)")
});

static SHEET_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^[A-Za-z0-9_-]{44}$"));

/// Column class derived from a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    /// A column with a known asset kind.
    Asset(AssetKind),
    /// Anything else; URLs found here are `other-http` unless they look like trailers.
    Other,
}

/// Classifies a sheet column by header keywords.
#[must_use]
pub fn classify_column(header: &str) -> ColumnClass {
    let h = header.trim().to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| h.contains(k));
    if has_any(&FILM_KEYWORDS) {
        ColumnClass::Asset(AssetKind::Film)
    } else if has_any(&TRAILER_KEYWORDS) {
        ColumnClass::Asset(AssetKind::Trailer)
    } else if has_any(&STILL_KEYWORDS) {
        ColumnClass::Asset(AssetKind::Still)
    } else if has_any(&POSTER_KEYWORDS) {
        ColumnClass::Asset(AssetKind::Poster)
    } else {
        ColumnClass::Other
    }
}

/// Asset kind for a URL found in a column of the given class.
#[must_use]
pub fn asset_kind_for(class: ColumnClass, url: &str) -> AssetKind {
    match class {
        ColumnClass::Asset(kind) => kind,
        ColumnClass::Other => {
            let lower = url.to_lowercase();
            if lower.contains("trailer") || lower.contains("teaser") {
                AssetKind::Trailer
            } else {
                AssetKind::OtherHttp
            }
        }
    }
}

/// URLs in a free-text cell, trailing punctuation trimmed, first occurrence kept.
#[must_use]
pub fn extract_urls(cell: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for found in HTTP_URL_RE.find_iter(cell) {
        let trimmed = found
            .as_str()
            .trim_end_matches([')', ',', '.', ';', ']'])
            .to_string();
        if !urls.contains(&trimmed) {
            urls.push(trimmed);
        }
    }
    urls
}

/// A password written next to the link, e.g. `pw: festival2024`.
#[must_use]
pub fn extract_password(cell: &str) -> Option<String> {
    // Skip matches that sit inside a URL (e.g. `...?pass=...` query strings).
    let without_urls = HTTP_URL_RE.replace_all(cell, " ");
    PASSWORD_RE
        .captures(&without_urls)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// True for a Google Sheets link or a bare sheet id.
#[must_use]
pub fn is_google_sheet_link(value: &str) -> bool {
    let value = value.trim();
    value.contains("docs.google.com/spreadsheets") || SHEET_ID_RE.is_match(value)
}

/// CSV export URL for a Google Sheets link or id.
#[must_use]
pub fn sheet_export_url(link_or_id: &str) -> String {
    let trimmed = link_or_id.trim();
    let sheet_id = trimmed
        .split_once("/d/")
        .map_or(trimmed, |(_, rest)| rest.split('/').next().unwrap_or(rest));
    format!("https://docs.google.com/spreadsheets/d/{sheet_id}/export?format=csv")
}

/// Parses a submission sheet export into rows.
///
/// The first record is the header. Rows without a film-name column value keep
/// an empty name; the job builder decides what to do with them.
///
/// # Errors
///
/// Returns an error for malformed CSV or a sheet without a header row.
pub fn rows_from_csv(text: &str) -> Result<Vec<SubmissionRow>, SubmissionError> {
    let mut records = parse_records(text)?.into_iter();
    let header = records.next().ok_or(SubmissionError::MissingHeader)?.fields;
    let film_column = FILM_NAME_HEADERS.iter().find_map(|wanted| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    });
    if film_column.is_none() {
        debug!("no film name column found; every row will be rejected");
    }
    let classes: Vec<ColumnClass> = header.iter().map(|h| classify_column(h)).collect();

    let mut rows = Vec::new();
    for Record { line, fields: record } in records {
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let film_name = film_column
            .and_then(|col| record.get(col))
            .map(|name| name.trim().to_string())
            .unwrap_or_default();

        let mut assets = Vec::new();
        for (col, cell) in record.iter().enumerate() {
            let urls = extract_urls(cell);
            if urls.is_empty() {
                continue;
            }
            let class = classes.get(col).copied().unwrap_or(ColumnClass::Other);
            let password = extract_password(cell);
            for url in urls {
                assets.push(AssetRef {
                    kind: asset_kind_for(class, &url),
                    url,
                    password: password.clone().map(Secret::new),
                });
            }
        }

        rows.push(SubmissionRow {
            row_number: Some(line),
            film_name,
            assets,
        });
    }
    Ok(rows)
}
