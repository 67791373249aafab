//! Resolution: turns a classified link into a fetch plan.
//!
//! The strategy set is closed, so [`ResolverSet::resolve`] is a single match
//! over [`Link`]. The only open seam is the [`Extractor`] trait, which wraps
//! the external streaming tool and can be replaced in tests.
//!
//! # Architecture
//!
//! - [`ResolutionPlan`] - a concrete fetch or a delegation to the extractor
//! - [`ResolverSet`] - shared client, Drive adapter and extractor
//! - [`GoogleDriveResolver`] - Drive ids, including the large-file interstitial
//! - [`resolve_direct`] - HEAD / ranged-GET probe for plain and Dropbox links
//! - [`YtDlpExtractor`] - the default [`Extractor`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use festival_fetch::download::HttpClient;
//! use festival_fetch::link::classify;
//! use festival_fetch::resolver::{ResolutionPlan, ResolverSet, YtDlpExtractor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolvers = ResolverSet::new(HttpClient::new()?, Arc::new(YtDlpExtractor::new("yt-dlp")));
//! let link = classify("https://drive.google.com/open?id=1AbCdEfGhIjK");
//! match resolvers.resolve(&link, None).await? {
//!     ResolutionPlan::Fetch(target) => println!("fetch {}", target.url),
//!     ResolutionPlan::Delegated(request) => println!("extractor: {}", request.url),
//! }
//! # Ok(())
//! # }
//! ```

mod direct;
mod error;
mod google_drive;
mod streaming;

pub use direct::{DirectKind, resolve_direct};
pub use error::ResolveError;
pub use google_drive::{DEFAULT_DRIVE_BASE, GoogleDriveResolver, Interstitial, parse_interstitial};
pub use streaming::{Extractor, ExtractorRequest, FORMAT_SELECTOR, YtDlpExtractor, locate_output};

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::download::{FetchTarget, HttpClient};
use crate::job::Credential;
use crate::link::{Link, UnknownReason};

/// What the transfer stage should do for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPlan {
    /// Stream this target through the transfer executor.
    Fetch(FetchTarget),
    /// Hand the whole fetch to the extractor.
    Delegated(ExtractorRequest),
}

impl ResolutionPlan {
    /// URL the plan fetches from or delegates.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch(target) => &target.url,
            Self::Delegated(request) => &request.url,
        }
    }
}

/// Everything resolvers need, shared read-only by all workers.
#[derive(Clone)]
pub struct ResolverSet {
    client: HttpClient,
    drive: GoogleDriveResolver,
    extractor: Arc<dyn Extractor>,
}

impl fmt::Debug for ResolverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverSet")
            .field("drive", &self.drive)
            .field("extractor", &self.extractor.name())
            .finish_non_exhaustive()
    }
}

impl ResolverSet {
    /// Creates a resolver set against the public provider endpoints.
    #[must_use]
    pub fn new(client: HttpClient, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            client,
            drive: GoogleDriveResolver::new(),
            extractor,
        }
    }

    /// Replaces the Drive adapter.
    #[must_use]
    pub fn with_drive(mut self, drive: GoogleDriveResolver) -> Self {
        self.drive = drive;
        self
    }

    /// The HTTP client shared with the transfer executor.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// The extractor used for delegated plans.
    #[must_use]
    pub fn extractor(&self) -> &dyn Extractor {
        self.extractor.as_ref()
    }

    /// Resolves `link` into a plan. Streaming links perform no I/O here.
    ///
    /// # Errors
    ///
    /// Terminal classification failures and probe failures; see [`ResolveError`].
    pub async fn resolve(
        &self,
        link: &Link,
        credential: Option<&Credential>,
    ) -> Result<ResolutionPlan, ResolveError> {
        debug!(strategy = %link.strategy(), "resolving");
        match link {
            Link::DirectHttp { url } => {
                resolve_direct(&self.client, url.as_str(), DirectKind::Plain)
                    .await
                    .map(ResolutionPlan::Fetch)
            }
            Link::Dropbox { url } => {
                resolve_direct(&self.client, url.as_str(), DirectKind::Dropbox)
                    .await
                    .map(ResolutionPlan::Fetch)
            }
            Link::GoogleDrive {
                file_id: Some(file_id),
                original,
            } => self
                .drive
                .resolve(&self.client, file_id, original)
                .await
                .map(ResolutionPlan::Fetch),
            Link::GoogleDrive {
                file_id: None,
                original,
            } => Err(ResolveError::malformed_link(
                original,
                "Google Drive link without a file id",
            )),
            Link::Streaming { url } => Ok(ResolutionPlan::Delegated(ExtractorRequest {
                url: url.to_string(),
                credential: credential.cloned(),
            })),
            Link::Unknown { raw, reason } => Err(match reason {
                UnknownReason::Unparseable => {
                    ResolveError::malformed_link(raw, "not an absolute URL")
                }
                UnknownReason::UnsupportedScheme(scheme) => ResolveError::unsupported_host(
                    raw,
                    &format!("scheme '{scheme}' is not supported"),
                ),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::link::classify;
    use std::path::{Path, PathBuf};

    #[derive(Debug)]
    struct NoopExtractor;

    #[async_trait::async_trait]
    impl Extractor for NoopExtractor {
        fn name(&self) -> &str {
            "noop"
        }

        async fn fetch(
            &self,
            request: &ExtractorRequest,
            _stem: &Path,
        ) -> Result<PathBuf, ResolveError> {
            Err(ResolveError::extractor_failed(&request.url, "noop"))
        }
    }

    fn resolvers() -> ResolverSet {
        ResolverSet::new(HttpClient::new().unwrap(), Arc::new(NoopExtractor))
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_unsupported_host() {
        let err = resolvers()
            .resolve(&classify("ftp://files.example/poster.jpg"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedHost { .. }));
    }

    #[tokio::test]
    async fn test_garbage_is_malformed_link() {
        let err = resolvers()
            .resolve(&classify("see attached"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedLink { .. }));
    }

    #[tokio::test]
    async fn test_drive_without_id_is_malformed_link() {
        let err = resolvers()
            .resolve(&classify("https://drive.google.com/drive/folders"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedLink { .. }));
    }

    #[tokio::test]
    async fn test_streaming_is_delegated_with_credential() {
        let credential = Credential {
            cookies_file: Some(PathBuf::from("/tmp/cookies.txt")),
            password: None,
        };
        let plan = resolvers()
            .resolve(&classify("https://vimeo.com/123456"), Some(&credential))
            .await
            .unwrap();
        let ResolutionPlan::Delegated(request) = plan else {
            panic!("expected delegated plan");
        };
        assert_eq!(request.url, "https://vimeo.com/123456");
        assert_eq!(request.credential, Some(credential));
    }

    #[test]
    fn test_debug_names_extractor() {
        let rendered = format!("{:?}", resolvers());
        assert!(rendered.contains("noop"));
    }
}
