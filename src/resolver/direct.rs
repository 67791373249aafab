//! Direct HTTP and Dropbox links: one probe, then a plain fetch.

use tracing::{debug, instrument, warn};

use super::ResolveError;
use crate::download::{FetchTarget, HttpClient};

/// Which provider a probed URL belongs to; decides how HTML answers are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectKind {
    /// Arbitrary web server.
    Plain,
    /// Dropbox share link with `dl=1`.
    Dropbox,
}

/// Probes `url` and turns the answer into a fetch target.
///
/// Redirects are followed during the probe and the final URL is fetched, so
/// the transfer does not repeat the chain.
///
/// # Errors
///
/// `access-denied` for refusals and Dropbox preview pages, probe failures otherwise.
#[instrument(skip(client), fields(resolver = "direct"))]
pub async fn resolve_direct(
    client: &HttpClient,
    url: &str,
    kind: DirectKind,
) -> Result<FetchTarget, ResolveError> {
    let probe = client
        .probe(url)
        .await
        .map_err(|e| ResolveError::from_probe(url, e))?;

    if probe.final_url.as_str() != url {
        debug!(final_url = %probe.final_url, "followed redirects");
    }

    if probe.is_html() {
        match kind {
            DirectKind::Dropbox => {
                return Err(ResolveError::access_denied(
                    url,
                    "Dropbox served a preview page; the share is private, expired or removed",
                ));
            }
            DirectKind::Plain => {
                warn!(url, "server answered with HTML; fetching the page as-is");
            }
        }
    }

    Ok(FetchTarget {
        url: probe.final_url.to_string(),
        expected_size: probe.total_size,
        accepts_ranges: probe.accepts_ranges,
        extension: probe.extension_for(probe.final_url.as_str()),
    })
}
