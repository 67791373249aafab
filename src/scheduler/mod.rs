//! Scheduler: a fixed worker pool driving each job through its state machine.
//!
//! # Concurrency Model
//!
//! - A semaphore holds one permit per worker; a job task is only spawned
//!   once it holds a permit, so at most `workers` jobs run at a time
//! - Each job runs in its own Tokio task; a panic becomes an `internal` failure
//! - Outcomes flow back over an mpsc channel tagged with their sequence index
//!   and are sorted before being returned
//!
//! # Retry Behavior
//!
//! - `extractor-failed`, network errors, 5xx/408/429 and integrity mismatches
//!   go back to `Pending` with exponential backoff
//! - `unsupported-host`, `malformed-link`, `access-denied`, other 4xx and
//!   filesystem errors end the job on the first attempt

mod state;

pub use state::{JobError, JobState};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, RunConfig};
use crate::download::{RetryDecision, RetryPolicy};
use crate::job::{BuildOutput, Job, record_fetched, write_stub};
use crate::link::{Link, classify};
use crate::outcome::{JobOutcome, OutcomeStatus};
use crate::resolver::{ResolutionPlan, ResolverSet};

/// Cap on exponential backoff between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(32);

/// Backoff growth factor.
const BACKOFF_MULTIPLIER: f32 = 2.0;

/// Callback invoked once per finished outcome (progress reporting).
pub type OutcomeHook = Arc<dyn Fn(&JobOutcome) + Send + Sync>;

/// Runs a built job sequence to completion.
pub struct Scheduler {
    runner: Arc<JobRunner>,
    workers: usize,
    dry_run: bool,
    on_outcome: Option<OutcomeHook>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.workers)
            .field("dry_run", &self.dry_run)
            .field("policy", &self.runner.policy)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is out of range.
    pub fn new(config: &RunConfig, resolvers: ResolverSet) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = RetryPolicy::new(
            config.max_retries + 1,
            config.retry_base_delay,
            MAX_BACKOFF,
            BACKOFF_MULTIPLIER,
        )
        .with_max_jitter(config.retry_max_jitter);

        debug!(
            workers = config.workers,
            max_attempts = policy.max_attempts(),
            dry_run = config.dry_run,
            "creating scheduler"
        );

        Ok(Self {
            runner: Arc::new(JobRunner {
                resolvers,
                policy,
                stub_unobtainable: config.stub_unobtainable,
            }),
            workers: config.workers,
            dry_run: config.dry_run,
            on_outcome: None,
        })
    }

    /// Registers a callback for each finished outcome, skips included.
    #[must_use]
    pub fn on_outcome(mut self, hook: OutcomeHook) -> Self {
        self.on_outcome = Some(hook);
        self
    }

    /// Runs every job and returns all outcomes ordered by sequence index.
    ///
    /// Individual job failures never abort the run; every job and every
    /// pre-skipped asset yields exactly one outcome.
    #[instrument(skip_all, fields(jobs = build.jobs.len(), skipped = build.skipped.len()))]
    pub async fn run(&self, build: BuildOutput) -> Vec<JobOutcome> {
        let BuildOutput { jobs, skipped, .. } = build;
        let mut outcomes = Vec::with_capacity(jobs.len() + skipped.len());
        for outcome in skipped {
            self.notify(&outcome);
            outcomes.push(outcome);
        }

        if self.dry_run {
            for job in &jobs {
                let link = classify(&job.url);
                info!(
                    id = %job.id,
                    strategy = %link.strategy(),
                    url = link.normalized_url().as_deref().unwrap_or(job.url.as_str()),
                    dest = %job.dest_stem.display(),
                    "planned"
                );
                let outcome = JobOutcome {
                    resolved_url: link.normalized_url(),
                    ..JobOutcome::not_run(job, link.strategy(), OutcomeStatus::Planned, None)
                };
                self.notify(&outcome);
                outcomes.push(outcome);
            }
        } else {
            outcomes.extend(self.run_pool(jobs).await);
        }

        outcomes.sort_by_key(|outcome| outcome.seq);
        outcomes
    }

    async fn run_pool(&self, jobs: Vec<Job>) -> Vec<JobOutcome> {
        let (tx, mut rx) = mpsc::channel::<JobOutcome>(self.workers.max(1) * 2);
        let hook = self.on_outcome.clone();
        let collector = tokio::spawn(async move {
            let mut collected = Vec::new();
            while let Some(outcome) = rx.recv().await {
                if let Some(hook) = &hook {
                    hook(&outcome);
                }
                collected.push(outcome);
            }
            collected
        });

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(jobs.len());
        info!(workers = self.workers, jobs = jobs.len(), "starting worker pool");

        for job in jobs {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                warn!("worker pool closed early");
                break;
            };
            let runner = Arc::clone(&self.runner);
            let tx = tx.clone();
            let job = Arc::new(job);
            let task_job = Arc::clone(&job);
            let started = Instant::now();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = runner.run_job(&task_job).await;
                if tx.send(outcome).await.is_err() {
                    warn!(id = %task_job.id, "outcome collector gone");
                }
            });
            handles.push((job, started, handle));
        }

        for (job, started, handle) in handles {
            if let Err(e) = handle.await {
                warn!(id = %job.id, error = %e, "job task panicked");
                let error = JobError::Panicked(e.to_string());
                let outcome = failed_outcome(&job, &classify(&job.url), &error, 0, started, None);
                if tx.send(outcome).await.is_err() {
                    warn!(id = %job.id, "outcome collector gone");
                }
            }
        }
        drop(tx);

        match collector.await {
            Ok(collected) => collected,
            Err(e) => {
                warn!(error = %e, "outcome collector panicked");
                Vec::new()
            }
        }
    }

    fn notify(&self, outcome: &JobOutcome) {
        if let Some(hook) = &self.on_outcome {
            hook(outcome);
        }
    }
}

/// Shared, read-only state for job tasks.
#[derive(Debug)]
struct JobRunner {
    resolvers: ResolverSet,
    policy: RetryPolicy,
    stub_unobtainable: bool,
}

impl JobRunner {
    #[instrument(skip_all, fields(id = %job.id, seq = job.seq))]
    async fn run_job(&self, job: &Job) -> JobOutcome {
        let started = Instant::now();
        let link = classify(&job.url);
        let mut state = JobState::start();
        let mut resolved_url = None;

        while !state.is_terminal() {
            debug!(state = state.name(), "job step");
            state = self.step(job, &link, state).await;
            if let JobState::Transferring { plan, .. } = &state {
                resolved_url = Some(plan.url().to_string());
            }
        }

        match state {
            JobState::Succeeded { path, attempts } => {
                info!(path = %path.display(), attempts, "downloaded");
                if let Err(e) = record_fetched(&path).await {
                    warn!(error = %e, "cannot record finished file; later runs apply the size threshold");
                }
                JobOutcome {
                    resolved_url,
                    attempts,
                    elapsed: started.elapsed(),
                    ..JobOutcome::not_run(job, link.strategy(), OutcomeStatus::Downloaded, Some(path))
                }
            }
            JobState::Failed { error, attempts } => {
                let outcome = failed_outcome(job, &link, &error, attempts, started, resolved_url);
                if let Some(failure) = &outcome.failure {
                    warn!(kind = %failure.kind, attempts, error = %error, "job failed");
                    if self.stub_unobtainable && failure.kind.is_unobtainable() {
                        let reason = format!("{}: {}", failure.kind, failure.detail);
                        match write_stub(&job.dest_stem, &reason).await {
                            Ok(path) => debug!(path = %path.display(), "wrote stub"),
                            Err(e) => warn!(error = %e, "cannot write stub"),
                        }
                    }
                }
                outcome
            }
            other => {
                let error = JobError::Panicked(format!("job stopped in state {}", other.name()));
                failed_outcome(job, &link, &error, 0, started, resolved_url)
            }
        }
    }

    async fn step(&self, job: &Job, link: &Link, state: JobState) -> JobState {
        match state {
            JobState::Pending { attempt } => JobState::Resolving { attempt },
            JobState::Resolving { attempt } => {
                match self.resolvers.resolve(link, job.credential.as_ref()).await {
                    Ok(plan) => JobState::Transferring { attempt, plan },
                    Err(e) => self.after_failure(JobError::Resolve(e), attempt).await,
                }
            }
            JobState::Transferring { attempt, plan } => match self.execute(job, plan).await {
                Ok(path) => JobState::Succeeded {
                    path,
                    attempts: attempt,
                },
                Err(e) => self.after_failure(e, attempt).await,
            },
            terminal => terminal,
        }
    }

    async fn execute(
        &self,
        job: &Job,
        plan: ResolutionPlan,
    ) -> Result<std::path::PathBuf, JobError> {
        match plan {
            ResolutionPlan::Fetch(target) => {
                let report = self
                    .resolvers
                    .client()
                    .transfer(&target, &job.dest_stem)
                    .await?;
                debug!(bytes = report.bytes, resumed = report.resumed, "transfer complete");
                Ok(report.path)
            }
            ResolutionPlan::Delegated(request) => Ok(self
                .resolvers
                .extractor()
                .fetch(&request, &job.dest_stem)
                .await?),
        }
    }

    async fn after_failure(&self, error: JobError, attempt: u32) -> JobState {
        match self
            .policy
            .should_retry(error.failure_type(), attempt, error.retry_after())
        {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                info!(
                    attempt = next_attempt,
                    max_attempts = self.policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "retrying job"
                );
                tokio::time::sleep(delay).await;
                JobState::Pending {
                    attempt: next_attempt,
                }
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(%reason, "not retrying job");
                JobState::Failed {
                    error,
                    attempts: attempt,
                }
            }
        }
    }
}

fn failed_outcome(
    job: &Job,
    link: &Link,
    error: &JobError,
    attempts: u32,
    started: Instant,
    resolved_url: Option<String>,
) -> JobOutcome {
    JobOutcome {
        failure: Some(error.failure()),
        resolved_url,
        attempts,
        elapsed: started.elapsed(),
        ..JobOutcome::not_run(job, link.strategy(), OutcomeStatus::Failed, None)
    }
}
