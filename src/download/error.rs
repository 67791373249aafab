//! Error types for the transfer layer.
//!
//! Every variant carries the URL or path it concerns; there are no blanket
//! `From` conversions because the source errors lack that context.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while probing or transferring bytes.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Network-level failure (DNS, connection refused/reset, TLS).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// URL being fetched.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timed out.
    #[error("timeout fetching {url}")]
    Timeout {
        /// URL being fetched.
        url: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// URL being fetched.
        url: String,
        /// Status code.
        status: u16,
        /// Raw Retry-After header, if the server sent one.
        retry_after: Option<String>,
    },

    /// 401/403/407 from the server.
    #[error("access denied (HTTP {status}) fetching {url}\n  Suggestion: {suggestion}")]
    AccessDenied {
        /// URL being fetched.
        url: String,
        /// Status code.
        status: u16,
        /// What the operator can do about it.
        suggestion: &'static str,
    },

    /// Local filesystem failure (create dir, write, rename).
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The plan carried a URL the client cannot use.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// Offending value.
        url: String,
    },

    /// Byte count after transfer did not match the expected size.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Partial file that failed verification.
        path: PathBuf,
        /// Expected size.
        expected_bytes: u64,
        /// Observed size.
        actual_bytes: u64,
    },
}

impl TransferError {
    /// Network error from a reqwest failure, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// HTTP status error without Retry-After.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// HTTP status error with an optional Retry-After value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Access-denied error; 407 points at proxy settings, everything else at credentials.
    pub fn access_denied(url: impl Into<String>, status: u16) -> Self {
        let suggestion = if status == 407 {
            "Configure your HTTP proxy settings or check proxy credentials."
        } else {
            "Ask the submitter to share the file publicly or pass exported cookies with --cookies."
        };
        Self::AccessDenied {
            url: url.into(),
            status,
            suggestion,
        }
    }

    /// Filesystem error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Size mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_suggestion_depends_on_status() {
        let proxy = TransferError::access_denied("https://a.example/x", 407).to_string();
        assert!(proxy.contains("proxy"), "{proxy}");

        let forbidden = TransferError::access_denied("https://a.example/x", 403).to_string();
        assert!(forbidden.contains("HTTP 403"), "{forbidden}");
        assert!(forbidden.contains("--cookies"), "{forbidden}");
    }

    #[test]
    fn test_integrity_display_names_both_sizes() {
        let msg = TransferError::integrity("/tmp/film.part", 100, 40).to_string();
        assert!(msg.contains("expected 100 bytes"));
        assert!(msg.contains("got 40"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = TransferError::io(
            "/tmp/out",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/tmp/out"));
    }
}
