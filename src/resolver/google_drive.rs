//! Google Drive share links, including the large-file interstitial.
//!
//! Files above Drive's scan limit answer the download URL with an HTML
//! "can't scan this file for viruses" page instead of bytes. The page carries a
//! `download-form` whose hidden inputs (`confirm`, `uuid`) must be replayed to
//! get the file. Older variants put `confirm=<token>` into a link instead.
//! Detection keys on that response shape only, so a changed page degrades to
//! `access-denied` rather than a corrupt download. The "too many users" quota
//! page is temporary and is reported as retryable instead.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};
use url::Url;

use super::ResolveError;
use crate::download::{FetchTarget, HttpClient, ProbeResponse};
use crate::link::utils::{absolutize_url, compile_static_regex, decode_html_attr};

/// Public Drive endpoint.
pub const DEFAULT_DRIVE_BASE: &str = "https://drive.google.com";

static FORM_ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<form[^>]*id="download-form"[^>]*action="([^"]+)""#)
});
static CONFIRM_INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"name="confirm"\s+value="([^"]+)""#));
static CONFIRM_QUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"confirm=([0-9A-Za-z_-]+)"));
static UUID_INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"name="uuid"\s+value="([^"]+)""#));

/// Tokens lifted from an interstitial page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interstitial {
    /// Form action to replay against, when the page names one.
    pub action: Option<String>,
    /// Confirmation token.
    pub confirm: String,
    /// Per-download uuid, when present.
    pub uuid: Option<String>,
}

/// Parses the virus-scan interstitial, if `html` is one.
#[must_use]
pub fn parse_interstitial(html: &str, page_url: &Url) -> Option<Interstitial> {
    let confirm = CONFIRM_INPUT_RE
        .captures(html)
        .or_else(|| CONFIRM_QUERY_RE.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|m| decode_html_attr(m.as_str()))?;
    let action = FORM_ACTION_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| absolutize_url(&decode_html_attr(m.as_str()), page_url));
    let uuid = UUID_INPUT_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_html_attr(m.as_str()));
    Some(Interstitial {
        action,
        confirm,
        uuid,
    })
}

fn looks_like_login(html: &str, final_url: &Url) -> bool {
    final_url
        .host_str()
        .is_some_and(|host| host.starts_with("accounts."))
        || html.contains("ServiceLogin")
        || html.contains("accounts.google.com/signin")
}

/// Markers of Drive's per-file download quota page, matched lowercase.
const QUOTA_MARKERS: [&str; 3] = [
    "too many users have viewed or downloaded this file",
    "download quota",
    "quota exceeded",
];

fn looks_like_quota(html: &str) -> bool {
    let lower = html.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Resolver for Google Drive file ids.
#[derive(Debug, Clone)]
pub struct GoogleDriveResolver {
    base_url: String,
}

impl Default for GoogleDriveResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleDriveResolver {
    /// Resolver against the public Drive endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_DRIVE_BASE)
    }

    /// Resolver against another endpoint (mock servers, proxies).
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Canonical download URL for `file_id` on this endpoint.
    #[must_use]
    pub fn download_url(&self, file_id: &str) -> String {
        format!("{}/uc?export=download&id={file_id}", self.base_url)
    }

    /// Resolves a file id into a fetch target, passing the interstitial if shown.
    ///
    /// # Errors
    ///
    /// `access-denied` for login pages and unrecognised HTML, `QuotaExceeded`
    /// for the quota page, probe failures otherwise.
    #[instrument(skip(self, client), fields(resolver = "google-drive"))]
    pub async fn resolve(
        &self,
        client: &HttpClient,
        file_id: &str,
        input: &str,
    ) -> Result<FetchTarget, ResolveError> {
        let url = self.download_url(file_id);
        let probe = client
            .probe_range(&url)
            .await
            .map_err(|e| ResolveError::from_probe(input, e))?;
        if !probe.is_html() {
            return Ok(target_from_probe(url, &probe));
        }

        let html = probe.html_body.as_deref().unwrap_or_default();
        // Quota pages also carry a sign-in link, so they are checked first.
        if looks_like_quota(html) {
            return Err(ResolveError::quota_exceeded(
                input,
                "Drive reports too many recent downloads of this file",
            ));
        }
        if looks_like_login(html, &probe.final_url) {
            return Err(ResolveError::access_denied(
                input,
                "Drive asked for a sign-in; the file is not shared publicly",
            ));
        }
        let Some(interstitial) = parse_interstitial(html, &probe.final_url) else {
            return Err(ResolveError::access_denied(
                input,
                "Drive returned an HTML page without a download token",
            ));
        };

        let replay = self.replay_url(file_id, &interstitial)?;
        debug!(url = %replay, "replaying Drive confirmation");
        let confirmed = client
            .probe_range(&replay)
            .await
            .map_err(|e| ResolveError::from_probe(input, e))?;
        if confirmed.is_html() {
            if looks_like_quota(confirmed.html_body.as_deref().unwrap_or_default()) {
                return Err(ResolveError::quota_exceeded(
                    input,
                    "Drive reports too many recent downloads of this file",
                ));
            }
            return Err(ResolveError::access_denied(
                input,
                "Drive kept returning HTML after confirmation",
            ));
        }
        Ok(target_from_probe(replay, &confirmed))
    }

    fn replay_url(&self, file_id: &str, interstitial: &Interstitial) -> Result<String, ResolveError> {
        let action = interstitial
            .action
            .clone()
            .unwrap_or_else(|| format!("{}/uc", self.base_url));
        let mut url = Url::parse(&action).map_err(|_| {
            ResolveError::malformed_link(&action, "Drive confirmation form has an invalid action")
        })?;
        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("id", file_id)
                .append_pair("export", "download")
                .append_pair("confirm", &interstitial.confirm);
            if let Some(uuid) = &interstitial.uuid {
                query.append_pair("uuid", uuid);
            }
        }
        Ok(url.to_string())
    }
}

fn target_from_probe(url: String, probe: &ProbeResponse) -> FetchTarget {
    let extension = probe.extension_for(probe.final_url.as_str());
    FetchTarget {
        url,
        expected_size: probe.total_size,
        accepts_ranges: probe.accepts_ranges,
        extension,
    }
}
