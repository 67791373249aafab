//! Turns submission rows into the ordered job sequence.
//!
//! Idempotence checks run here, before a job exists, so repeated runs over the
//! same sheet only ever queue genuinely missing assets.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::{AssetKind, Credential, Job, LocalIndex, job_id};
use crate::config::RunConfig;
use crate::download::filename::{sanitize_filename, stem_component};
use crate::link::classify;
use crate::outcome::{JobOutcome, OutcomeStatus};
use crate::submission::{AssetRef, SubmissionRow};

/// A submission row excluded from the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    /// Position of the row in the input (0-based).
    pub index: usize,
    /// Source line, when the row came from a sheet.
    pub row_number: Option<usize>,
    /// Why the row was rejected.
    pub reason: String,
}

/// Result of one builder pass.
#[derive(Debug, Default)]
pub struct BuildOutput {
    /// Jobs for the scheduler, in sequence order.
    pub jobs: Vec<Job>,
    /// Assets resolved without running a job (existing files, stubs).
    pub skipped: Vec<JobOutcome>,
    /// Rows that produced no candidates at all.
    pub rejected: Vec<RowRejection>,
}

impl BuildOutput {
    /// Number of outcomes this pass will produce.
    #[must_use]
    pub fn total(&self) -> usize {
        self.jobs.len() + self.skipped.len()
    }
}

/// Builds jobs against the output tree described by a [`RunConfig`].
#[derive(Debug)]
pub struct JobBuilder<'a> {
    config: &'a RunConfig,
    index: LocalIndex,
}

impl<'a> JobBuilder<'a> {
    /// Creates a builder with a fresh view of the output tree.
    #[must_use]
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            config,
            index: LocalIndex::new(),
        }
    }

    /// Builds the job sequence for `rows`.
    ///
    /// Sequence numbers cover jobs and skips together, in row order, so the
    /// report lists assets in the order they were submitted.
    pub fn build(mut self, rows: &[SubmissionRow]) -> BuildOutput {
        let mut output = BuildOutput::default();
        let mut seen: HashSet<(String, AssetKind, String)> = HashSet::new();
        let mut ordinals: HashMap<(String, AssetKind), usize> = HashMap::new();
        let mut used_stems: HashSet<String> = HashSet::new();
        let mut seq = 0usize;

        for (index, row) in rows.iter().enumerate() {
            let film = row.film_name.trim();
            if film.is_empty() {
                warn!(
                    row = index,
                    line = ?row.row_number,
                    assets = row.assets.len(),
                    "rejecting row without a film name"
                );
                output.rejected.push(RowRejection {
                    index,
                    row_number: row.row_number,
                    reason: "missing film name".to_string(),
                });
                continue;
            }

            for asset in &row.assets {
                let url = asset.url.trim();
                if url.is_empty() {
                    continue;
                }
                if !self.config.filter.admits(asset.kind) {
                    debug!(film, kind = %asset.kind, url, "excluded by filter");
                    continue;
                }
                if !seen.insert((film.to_string(), asset.kind, url.to_string())) {
                    debug!(film, kind = %asset.kind, url, "duplicate asset ignored");
                    continue;
                }

                let ordinal_slot = ordinals.entry((film.to_string(), asset.kind)).or_insert(0);
                *ordinal_slot += 1;
                let ordinal = *ordinal_slot;

                let dest_stem = self.unique_stem(film, asset.kind, ordinal, &mut used_stems);
                let job = Job {
                    seq,
                    id: job_id(film, asset.kind, ordinal),
                    film: film.to_string(),
                    kind: asset.kind,
                    url: url.to_string(),
                    dest_stem,
                    credential: self.credential_for(asset),
                };
                seq += 1;

                match self.local_decision(&job) {
                    Some(outcome) => {
                        debug!(id = %job.id, status = %outcome.status, "asset already handled");
                        output.skipped.push(outcome);
                    }
                    None => output.jobs.push(job),
                }
            }
        }

        info!(
            jobs = output.jobs.len(),
            skipped = output.skipped.len(),
            rejected = output.rejected.len(),
            "built job sequence"
        );
        output
    }

    /// Destination stem for the `ordinal`-th asset of `kind`, unique in this run.
    fn unique_stem(
        &self,
        film: &str,
        kind: AssetKind,
        ordinal: usize,
        used: &mut HashSet<String>,
    ) -> PathBuf {
        let dir = self
            .config
            .output_root()
            .join(sanitize_filename(film))
            .join(kind.folder_name());
        let base = format!("{}_{}", stem_component(film), kind.stem_label());

        let mut n = ordinal;
        loop {
            let name = if n <= 1 {
                base.clone()
            } else {
                format!("{base}_{n}")
            };
            let candidate = dir.join(name);
            // Films whose names sanitize identically must not share a file.
            if used.insert(candidate.to_string_lossy().to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn credential_for(&self, asset: &AssetRef) -> Option<Credential> {
        let credential = Credential {
            cookies_file: self.config.cookies_file.clone(),
            password: asset.password.clone(),
        };
        (!credential.is_empty()).then_some(credential)
    }

    /// Stub, partial and existing-file checks, in that order. Files this
    /// crate finished are trusted at any size; others must clear the
    /// minimum plausible size.
    fn local_decision(&mut self, job: &Job) -> Option<JobOutcome> {
        let min_bytes = self.config.min_existing_bytes;
        let entry = self.index.lookup(&job.dest_stem)?;

        let (status, path) = if let Some(stub) = &entry.stub {
            (OutcomeStatus::SkippedStub, stub.clone())
        } else if entry.partial.is_some() {
            return None;
        } else if let Some(path) = &entry.fetched {
            (OutcomeStatus::SkippedExisting, path.clone())
        } else if let Some((path, len)) = entry.largest_complete()
            && len > min_bytes
        {
            (OutcomeStatus::SkippedExisting, path.to_path_buf())
        } else {
            return None;
        };

        let strategy = classify(&job.url).strategy();
        Some(JobOutcome::not_run(job, strategy, status, Some(path)))
    }
}
