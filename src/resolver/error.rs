//! Error types for resolver operations.
//!
//! Terminal kinds carry a What/Why/Suggestion triple so the report detail
//! tells the operator what to do next.

use thiserror::Error;

use crate::download::{FailureType, TransferError, classify_transfer_error};

/// Errors that can occur while turning a link into a fetch plan.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No strategy can fetch this link.
    #[error("unsupported host for '{input}': {reason}\n  Suggestion: {suggestion}")]
    UnsupportedHost {
        /// The submitted link.
        input: String,
        /// Why no strategy matched.
        reason: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The provider was recognised but the link lacks what it needs.
    #[error("malformed link '{input}': {reason}\n  Suggestion: {suggestion}")]
    MalformedLink {
        /// The submitted link.
        input: String,
        /// What is missing.
        reason: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The provider refused access.
    #[error("access denied for '{input}': {reason}\n  Suggestion: {suggestion}")]
    AccessDenied {
        /// The submitted link.
        input: String,
        /// What the provider answered.
        reason: String,
        /// How to get access.
        suggestion: String,
    },

    /// The provider is throttling downloads of this file for now.
    #[error("download quota exceeded for '{input}': {reason}")]
    QuotaExceeded {
        /// The submitted link.
        input: String,
        /// What the provider answered.
        reason: String,
    },

    /// The external extractor could not produce a file.
    #[error("extractor failed for '{input}': {reason}")]
    ExtractorFailed {
        /// The submitted link.
        input: String,
        /// Extractor diagnostics.
        reason: String,
    },

    /// The preliminary request failed below the provider level.
    #[error("probe failed: {0}")]
    Probe(#[source] TransferError),
}

impl ResolveError {
    /// Creates an `UnsupportedHost` error.
    #[must_use]
    pub fn unsupported_host(input: &str, reason: &str) -> Self {
        Self::UnsupportedHost {
            input: input.to_string(),
            reason: reason.to_string(),
            suggestion: "Ask the submitter for an http(s), Google Drive, Dropbox or Vimeo/YouTube link"
                .to_string(),
        }
    }

    /// Creates a `MalformedLink` error.
    #[must_use]
    pub fn malformed_link(input: &str, reason: &str) -> Self {
        Self::MalformedLink {
            input: input.to_string(),
            reason: reason.to_string(),
            suggestion: "Check the link in the submission sheet for truncation or typos"
                .to_string(),
        }
    }

    /// Creates an `AccessDenied` error.
    #[must_use]
    pub fn access_denied(input: &str, reason: &str) -> Self {
        Self::AccessDenied {
            input: input.to_string(),
            reason: reason.to_string(),
            suggestion: "Ask the submitter to share the file publicly or pass exported cookies with --cookies"
                .to_string(),
        }
    }

    /// Creates a `QuotaExceeded` error.
    #[must_use]
    pub fn quota_exceeded(input: &str, reason: &str) -> Self {
        Self::QuotaExceeded {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `ExtractorFailed` error.
    #[must_use]
    pub fn extractor_failed(input: &str, reason: &str) -> Self {
        Self::ExtractorFailed {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wraps a probe failure; HTTP access refusals become `AccessDenied`.
    #[must_use]
    pub fn from_probe(input: &str, error: TransferError) -> Self {
        match error {
            TransferError::AccessDenied { status, .. } => {
                Self::access_denied(input, &format!("provider answered HTTP {status}"))
            }
            other => Self::Probe(other),
        }
    }

    /// Retry classification for this error.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::UnsupportedHost { .. } | Self::MalformedLink { .. } => FailureType::Permanent,
            Self::AccessDenied { .. } => FailureType::NeedsAuth,
            Self::ExtractorFailed { .. } => FailureType::Transient,
            Self::QuotaExceeded { .. } => FailureType::RateLimited,
            Self::Probe(error) => classify_transfer_error(error),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_kinds_are_not_retryable() {
        assert_eq!(
            ResolveError::unsupported_host("ftp://x", "scheme ftp").failure_type(),
            FailureType::Permanent
        );
        assert_eq!(
            ResolveError::malformed_link("https://drive.google.com/", "no file id").failure_type(),
            FailureType::Permanent
        );
        assert_eq!(
            ResolveError::access_denied("https://x", "login page").failure_type(),
            FailureType::NeedsAuth
        );
    }

    #[test]
    fn test_extractor_failure_is_transient() {
        assert_eq!(
            ResolveError::extractor_failed("https://vimeo.com/1", "exit 1").failure_type(),
            FailureType::Transient
        );
    }

    #[test]
    fn test_quota_exceeded_is_rate_limited() {
        let err = ResolveError::quota_exceeded("https://drive.google.com/uc?id=x", "too many users");
        assert_eq!(err.failure_type(), FailureType::RateLimited);
        assert!(err.to_string().contains("quota"));
    }

    #[test]
    fn test_from_probe_maps_access_denied() {
        let err = ResolveError::from_probe(
            "https://x.example/a",
            TransferError::access_denied("https://x.example/a", 403),
        );
        assert!(matches!(err, ResolveError::AccessDenied { .. }));
        assert!(err.to_string().contains("HTTP 403"));
    }

    #[test]
    fn test_from_probe_keeps_transfer_classification() {
        let err = ResolveError::from_probe(
            "https://x.example/a",
            TransferError::http_status("https://x.example/a", 503),
        );
        assert_eq!(err.failure_type(), FailureType::Transient);
        let err = ResolveError::from_probe(
            "https://x.example/a",
            TransferError::http_status("https://x.example/a", 404),
        );
        assert_eq!(err.failure_type(), FailureType::Permanent);
    }

    #[test]
    fn test_display_includes_suggestion() {
        let msg = ResolveError::unsupported_host("ftp://x/p.jpg", "scheme ftp is not supported")
            .to_string();
        assert!(msg.contains("ftp://x/p.jpg"));
        assert!(msg.contains("Suggestion:"));
    }
}
