//! Shared helpers for link handling: host normalization, static regexes, URL joins.

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Normalizes a host string: trim, lowercase, strip a leading "www." and trailing '.'.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    let lowered = host.trim().trim_end_matches('.').to_ascii_lowercase();
    lowered
        .strip_prefix("www.")
        .map_or_else(|| lowered.clone(), str::to_string)
}

/// Returns true if `host` is `domain` or one of its subdomains.
#[must_use]
pub fn host_matches_domain(host: &str, domain: &str) -> bool {
    let host = canonical_host(host);
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Absolute `http(s)` values pass through; `//host/...` is treated as https.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// Decodes the handful of HTML entities that show up inside attribute values.
#[must_use]
pub fn decode_html_attr(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&#x3D;", "=")
        .replace("&#61;", "=")
}
