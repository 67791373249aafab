//! Per-job state machine and the error that ends a job.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::download::{FailureType, TransferError, classify_transfer_error, parse_retry_after};
use crate::outcome::{Failure, FailureKind};
use crate::resolver::{ResolutionPlan, ResolveError};

/// Why a job attempt failed.
#[derive(Debug, Error)]
pub enum JobError {
    /// Resolution (or the delegated extractor run) failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The byte transfer failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The job task panicked or was cancelled.
    #[error("job task died: {0}")]
    Panicked(String),
}

impl JobError {
    /// Retry classification.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Resolve(error) => error.failure_type(),
            Self::Transfer(error) => classify_transfer_error(error),
            Self::Panicked(_) => FailureType::Permanent,
        }
    }

    /// Server-requested delay, for rate-limited failures.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        let transfer = match self {
            Self::Transfer(error) | Self::Resolve(ResolveError::Probe(error)) => error,
            _ => return None,
        };
        match transfer {
            TransferError::HttpStatus {
                retry_after: Some(value),
                ..
            } => parse_retry_after(value),
            _ => None,
        }
    }

    /// Report entry for this error.
    #[must_use]
    pub fn failure(&self) -> Failure {
        let kind = match self {
            Self::Resolve(error) => match error {
                ResolveError::UnsupportedHost { .. } => FailureKind::UnsupportedHost,
                ResolveError::MalformedLink { .. } => FailureKind::MalformedLink,
                ResolveError::AccessDenied { .. } => FailureKind::AccessDenied,
                ResolveError::ExtractorFailed { .. } => FailureKind::ExtractorFailed,
                ResolveError::QuotaExceeded { .. } => FailureKind::Network,
                ResolveError::Probe(error) => transfer_kind(error),
            },
            Self::Transfer(error) => transfer_kind(error),
            Self::Panicked(_) => FailureKind::Internal,
        };
        Failure {
            kind,
            detail: self.to_string(),
        }
    }
}

fn transfer_kind(error: &TransferError) -> FailureKind {
    match error {
        TransferError::Network { .. } | TransferError::Timeout { .. } => FailureKind::Network,
        TransferError::HttpStatus { status, .. } => match status {
            408 | 429 | 500..=599 => FailureKind::Network,
            _ => FailureKind::HttpStatus,
        },
        TransferError::AccessDenied { .. } => FailureKind::AccessDenied,
        TransferError::Io { .. } => FailureKind::Filesystem,
        TransferError::InvalidUrl { .. } => FailureKind::MalformedLink,
        TransferError::Integrity { .. } => FailureKind::Integrity,
    }
}

/// Where a job is in its lifecycle. Attempts are 1-based.
#[derive(Debug)]
pub enum JobState {
    /// Waiting to (re)start resolution.
    Pending {
        /// Attempt about to run.
        attempt: u32,
    },
    /// Turning the link into a plan.
    Resolving {
        /// Current attempt.
        attempt: u32,
    },
    /// Moving bytes according to `plan`.
    Transferring {
        /// Current attempt.
        attempt: u32,
        /// Plan produced by this attempt's resolution.
        plan: ResolutionPlan,
    },
    /// Final file is in place.
    Succeeded {
        /// Final path.
        path: PathBuf,
        /// Attempts used.
        attempts: u32,
    },
    /// Terminal failure.
    Failed {
        /// Last error.
        error: JobError,
        /// Attempts used.
        attempts: u32,
    },
}

impl JobState {
    /// Initial state.
    #[must_use]
    pub fn start() -> Self {
        Self::Pending { attempt: 1 }
    }

    /// True for `Succeeded` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Resolving { .. } => "resolving",
            Self::Transferring { .. } => "transferring",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}
