//! Per-job outcome records and run-level accounting.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::job::{AssetKind, Job};
use crate::link::Strategy;

/// Terminal status of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeStatus {
    /// Fetched and renamed into place during this run.
    Downloaded,
    /// A plausible final file already existed.
    SkippedExisting,
    /// A stub marks the asset as unobtainable.
    SkippedStub,
    /// All attempts failed or the failure was terminal.
    Failed,
    /// Dry run: classified but not fetched.
    Planned,
}

impl OutcomeStatus {
    /// Stable identifier used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
            Self::SkippedExisting => "skipped-existing",
            Self::SkippedStub => "skipped-stub",
            Self::Failed => "failed",
            Self::Planned => "planned",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure taxonomy as recorded in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No strategy can fetch this link.
    UnsupportedHost,
    /// Recognised provider, but the link lacks what the provider needs.
    MalformedLink,
    /// Provider refused access.
    AccessDenied,
    /// The external extractor failed.
    ExtractorFailed,
    /// Timeouts, resets, and server errors that outlived the retry budget.
    Network,
    /// A non-retryable HTTP status.
    HttpStatus,
    /// Byte count did not match the expected size.
    Integrity,
    /// Local filesystem failure.
    Filesystem,
    /// The job task itself died.
    Internal,
}

impl FailureKind {
    /// Stable identifier used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedHost => "unsupported-host",
            Self::MalformedLink => "malformed-link",
            Self::AccessDenied => "access-denied",
            Self::ExtractorFailed => "extractor-failed",
            Self::Network => "network",
            Self::HttpStatus => "http-status",
            Self::Integrity => "integrity",
            Self::Filesystem => "filesystem",
            Self::Internal => "internal",
        }
    }

    /// Kinds that mean the link itself is unusable, so a stub is worth writing.
    #[must_use]
    pub fn is_unobtainable(self) -> bool {
        matches!(
            self,
            Self::UnsupportedHost | Self::MalformedLink | Self::AccessDenied
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure kind plus human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Taxonomy entry.
    pub kind: FailureKind,
    /// Message for the operator.
    pub detail: String,
}

/// The single terminal record produced for each job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    /// Sequence index of the job; reports are ordered by it.
    pub seq: usize,
    /// Job identity.
    pub id: String,
    /// Film name.
    pub film: String,
    /// Asset kind.
    pub kind: AssetKind,
    /// URL as submitted.
    pub source_url: String,
    /// URL actually fetched or handed to the extractor, once known.
    pub resolved_url: Option<String>,
    /// Strategy the link classified to.
    pub strategy: Strategy,
    /// Terminal status.
    pub status: OutcomeStatus,
    /// Final file, when one exists.
    pub final_path: Option<PathBuf>,
    /// Failure details for `failed` outcomes.
    pub failure: Option<Failure>,
    /// Attempts made (0 for skips and dry runs).
    pub attempts: u32,
    /// Wall time spent on the job.
    pub elapsed: Duration,
}

impl JobOutcome {
    /// Outcome for a job that never ran (skip or dry-run plan).
    #[must_use]
    pub fn not_run(job: &Job, strategy: Strategy, status: OutcomeStatus, path: Option<PathBuf>) -> Self {
        Self {
            seq: job.seq,
            id: job.id.clone(),
            film: job.film.clone(),
            kind: job.kind,
            source_url: job.url.clone(),
            resolved_url: None,
            strategy,
            status,
            final_path: path,
            failure: None,
            attempts: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// True for downloaded and skipped outcomes.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            OutcomeStatus::Downloaded | OutcomeStatus::SkippedExisting | OutcomeStatus::SkippedStub
        )
    }
}

/// How the process should exit after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Nothing failed.
    Success,
    /// Some jobs failed, others succeeded.
    Partial,
    /// Every attempted job failed.
    Failure,
}

impl ExitOutcome {
    /// Process exit code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

/// Counts per status for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Downloaded this run.
    pub downloaded: usize,
    /// Skipped because a plausible file existed.
    pub skipped_existing: usize,
    /// Skipped because of a stub.
    pub skipped_stub: usize,
    /// Failed.
    pub failed: usize,
    /// Planned only (dry run).
    pub planned: usize,
}

impl RunSummary {
    /// Tallies outcomes.
    #[must_use]
    pub fn from_outcomes(outcomes: &[JobOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Downloaded => summary.downloaded += 1,
                OutcomeStatus::SkippedExisting => summary.skipped_existing += 1,
                OutcomeStatus::SkippedStub => summary.skipped_stub += 1,
                OutcomeStatus::Failed => summary.failed += 1,
                OutcomeStatus::Planned => summary.planned += 1,
            }
        }
        summary
    }

    /// Total outcomes counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped_existing + self.skipped_stub + self.failed + self.planned
    }

    /// Maps counts to an exit outcome.
    #[must_use]
    pub fn exit_outcome(&self) -> ExitOutcome {
        let completed = self.downloaded + self.skipped_existing + self.skipped_stub;
        if self.failed == 0 {
            ExitOutcome::Success
        } else if completed > 0 {
            ExitOutcome::Partial
        } else {
            ExitOutcome::Failure
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn outcome(status: OutcomeStatus) -> JobOutcome {
        JobOutcome {
            seq: 0,
            id: "Film::film".to_string(),
            film: "Film".to_string(),
            kind: AssetKind::Film,
            source_url: "https://x.example/a".to_string(),
            resolved_url: None,
            strategy: Strategy::DirectHttp,
            status,
            final_path: None,
            failure: None,
            attempts: 1,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        let summary = RunSummary::from_outcomes(&[
            outcome(OutcomeStatus::Downloaded),
            outcome(OutcomeStatus::SkippedExisting),
        ]);
        assert_eq!(summary.exit_outcome(), ExitOutcome::Success);
        assert_eq!(ExitOutcome::Success.code(), 0);
    }

    #[test]
    fn test_exit_outcome_success_for_empty_run() {
        assert_eq!(RunSummary::default().exit_outcome(), ExitOutcome::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        let summary = RunSummary::from_outcomes(&[
            outcome(OutcomeStatus::Downloaded),
            outcome(OutcomeStatus::Failed),
        ]);
        assert_eq!(summary.exit_outcome(), ExitOutcome::Partial);
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn test_exit_outcome_failure_when_everything_failed() {
        let summary = RunSummary::from_outcomes(&[outcome(OutcomeStatus::Failed)]);
        assert_eq!(summary.exit_outcome(), ExitOutcome::Failure);
        assert_eq!(ExitOutcome::Failure.code(), 1);
    }

    #[test]
    fn test_unobtainable_kinds() {
        assert!(FailureKind::AccessDenied.is_unobtainable());
        assert!(FailureKind::UnsupportedHost.is_unobtainable());
        assert!(!FailureKind::Network.is_unobtainable());
        assert!(!FailureKind::ExtractorFailed.is_unobtainable());
    }
}
