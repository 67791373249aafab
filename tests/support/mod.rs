//! Shared helpers for integration tests: run configs, submission rows, and a
//! scripted extractor standing in for the external streaming tool.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use festival_fetch::submission::AssetRef;
use festival_fetch::{
    AssetKind, Extractor, ExtractorRequest, GoogleDriveResolver, HttpClient, ResolveError,
    ResolverSet, RunConfig, Scheduler, SubmissionRow,
};
use tempfile::TempDir;

/// Config rooted in `dir` with near-zero backoff so retry tests stay fast.
pub fn quick_config(dir: &TempDir) -> RunConfig {
    let mut config = RunConfig::new(dir.path());
    config.retry_base_delay = Duration::from_millis(5);
    config.retry_max_jitter = Duration::ZERO;
    config
}

/// One submission row per film.
pub fn row(film: &str, assets: &[(AssetKind, &str)]) -> SubmissionRow {
    SubmissionRow {
        row_number: None,
        film_name: film.to_string(),
        assets: assets
            .iter()
            .map(|(kind, url)| AssetRef {
                kind: *kind,
                url: (*url).to_string(),
                password: None,
            })
            .collect(),
    }
}

/// Scheduler whose Drive adapter points at `drive_base` (a mock server).
pub fn scheduler_with_drive(
    config: &RunConfig,
    drive_base: &str,
    extractor: Arc<dyn Extractor>,
) -> Scheduler {
    let client = HttpClient::new().expect("failed to build client");
    let resolvers = ResolverSet::new(client, extractor)
        .with_drive(GoogleDriveResolver::with_base_url(drive_base));
    Scheduler::new(config, resolvers).expect("config should validate")
}

/// Scheduler against the public Drive endpoint (never reached in tests).
pub fn scheduler(config: &RunConfig, extractor: Arc<dyn Extractor>) -> Scheduler {
    let client = HttpClient::new().expect("failed to build client");
    Scheduler::new(config, ResolverSet::new(client, extractor)).expect("config should validate")
}

/// Extractor that fails a fixed number of times, then writes `<stem>.mp4`.
#[derive(Debug, Default)]
pub struct ScriptedExtractor {
    pub failures_left: AtomicU32,
    pub calls: AtomicU32,
}

impl ScriptedExtractor {
    pub fn failing(times: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicU32::new(times),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, request: &ExtractorRequest, stem: &Path) -> Result<PathBuf, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ResolveError::extractor_failed(
                &request.url,
                "ERROR: unable to download video data: HTTP Error 503",
            ));
        }
        let mut path = stem.as_os_str().to_owned();
        path.push(".mp4");
        let path = PathBuf::from(path);
        tokio::fs::create_dir_all(path.parent().expect("stem has a parent"))
            .await
            .expect("failed to create film folder");
        tokio::fs::write(&path, b"streamed video").await.expect("failed to write output");
        Ok(path)
    }
}
