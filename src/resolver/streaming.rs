//! Streaming platforms, fetched end-to-end by an external extractor.
//!
//! The extractor is a black box: given a page URL, a destination stem and
//! optional credentials it either leaves a finished file next to the stem or
//! fails. It has no resume contract, so every attempt starts from scratch:
//! files left under the stem by earlier runs are removed first, which keeps
//! a stale file from being reported as this attempt's output.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::ResolveError;
use crate::download::filename::stem_key;
use crate::job::Credential;

/// Format selector: best video up to 1080p merged with best audio.
pub const FORMAT_SELECTOR: &str = "bestvideo[height<=1080]+bestaudio/best[height<=1080]";

/// Longest stderr excerpt kept in an error detail.
const MAX_DIAGNOSTIC_CHARS: usize = 400;

/// Suffixes the extractor leaves behind for unfinished work.
const SCRATCH_SUFFIXES: [&str; 5] = [".part", ".ytdl", ".stub", ".temp", ".tmp"];

/// A delegated fetch for the extractor.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtractorRequest {
    /// Streaming page URL.
    pub url: String,
    /// Opaque credential material.
    pub credential: Option<Credential>,
}

impl fmt::Debug for ExtractorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRequest")
            .field("url", &self.url)
            .field("has_credential", &self.credential.is_some())
            .finish()
    }
}

/// An external tool that turns a streaming URL into a local file.
///
/// Implementations must only write files whose names start with the
/// destination stem.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fetches `request` and returns the finished file.
    async fn fetch(&self, request: &ExtractorRequest, stem: &Path)
    -> Result<PathBuf, ResolveError>;
}

/// [`Extractor`] backed by the `yt-dlp` command line.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: PathBuf,
}

impl YtDlpExtractor {
    /// Uses `program` (a name on `PATH` or a path) as the extractor binary.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, request: &ExtractorRequest, stem: &Path) -> Command {
        let mut template = stem.as_os_str().to_owned();
        template.push(".%(ext)s");

        let mut command = Command::new(&self.program);
        command
            .arg("--no-playlist")
            .arg("--no-continue")
            .arg("--force-overwrites")
            .arg("--no-progress")
            .arg("--no-warnings")
            .arg("-f")
            .arg(FORMAT_SELECTOR)
            .arg("-o")
            .arg(template);
        if let Some(credential) = &request.credential {
            if let Some(cookies) = &credential.cookies_file {
                command.arg("--cookies").arg(cookies);
            }
            if let Some(password) = &credential.password {
                command.arg("--video-password").arg(password.expose());
            }
        }
        command
            .arg(&request.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    #[instrument(skip(self, request), fields(url = %request.url, stem = %stem.display()))]
    async fn fetch(
        &self,
        request: &ExtractorRequest,
        stem: &Path,
    ) -> Result<PathBuf, ResolveError> {
        if let Some(parent) = stem.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ResolveError::extractor_failed(
                    &request.url,
                    &format!("cannot create {}: {e}", parent.display()),
                )
            })?;
        }

        clear_previous_outputs(stem).await.map_err(|e| {
            ResolveError::extractor_failed(&request.url, &format!("cannot clear old output: {e}"))
        })?;

        let output = self.command(request, stem).output().await.map_err(|e| {
            let reason = if e.kind() == std::io::ErrorKind::NotFound {
                format!("{} not found; install it or pass --extractor", self.program.display())
            } else {
                format!("cannot run {}: {e}", self.program.display())
            };
            ResolveError::extractor_failed(&request.url, &reason)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(ResolveError::extractor_failed(
                &request.url,
                &format!("exit status {code}: {}", tail(stderr.trim())),
            ));
        }

        debug!("extractor finished; locating output");
        locate_output(stem)
            .await
            .ok_or_else(|| {
                ResolveError::extractor_failed(&request.url, "finished without producing a file")
            })
    }
}

/// Largest finished file in the stem's directory that belongs to the stem.
pub async fn locate_output(stem: &Path) -> Option<PathBuf> {
    let dir = stem.parent()?;
    let key = stem_key(&stem.file_name()?.to_string_lossy());
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut best: Option<(PathBuf, u64)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let lower = name.to_lowercase();
        if stem_key(&name) != key || SCRATCH_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if meta.is_file() && best.as_ref().is_none_or(|(_, len)| meta.len() > *len) {
            best = Some((entry.path(), meta.len()));
        }
    }
    best.map(|(path, _)| path)
}

/// Removes every non-stub file belonging to `stem`.
async fn clear_previous_outputs(stem: &Path) -> std::io::Result<()> {
    let (Some(dir), Some(name)) = (stem.parent(), stem.file_name()) else {
        return Ok(());
    };
    let key = stem_key(&name.to_string_lossy());
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if stem_key(&name) != key || name.to_lowercase().ends_with(".stub") {
            continue;
        }
        if entry.file_type().await?.is_file() {
            debug!(path = %entry.path().display(), "removing previous extractor output");
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

fn tail(text: &str) -> String {
    let count = text.chars().count();
    if count <= MAX_DIAGNOSTIC_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - MAX_DIAGNOSTIC_CHARS).collect()
}
