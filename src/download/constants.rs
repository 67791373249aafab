//! Constants for the download module (timeouts, size thresholds).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-read timeout (5 minutes); whole-transfer time is unbounded for large films.
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Maximum Retry-After header value honoured (1 hour).
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Suffix of in-progress transfer files, appended to the destination stem.
pub const PARTIAL_SUFFIX: &str = "part";

/// Extension used when no better one can be derived.
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Upper bound on HTML bodies read while probing for interstitial pages.
pub const MAX_PROBE_BODY_BYTES: usize = 2 * 1024 * 1024;
