//! HTTP client wrapper: probing and resumable streamed transfers.
//!
//! A transfer always writes to `<stem>.part` and only produces the final
//! `<stem><ext>` through an atomic rename once the byte count checks out.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap,
    HeaderName, RANGE, RETRY_AFTER,
};
use reqwest::{Client, RequestBuilder, Response};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, MAX_PROBE_BODY_BYTES, PARTIAL_SUFFIX, READ_TIMEOUT_SECS,
};
use super::error::TransferError;
use super::filename::{choose_extension, parse_content_disposition};
use crate::user_agent;

/// What a resolver learned about a URL without downloading it.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    /// URL after redirects.
    pub final_url: Url,
    /// Status of the probe response.
    pub status: u16,
    /// Full resource size, when the server disclosed it.
    pub total_size: Option<u64>,
    /// Whether byte-range requests are honoured.
    pub accepts_ranges: bool,
    /// Raw Content-Type header.
    pub content_type: Option<String>,
    /// Filename from Content-Disposition.
    pub disposition_name: Option<String>,
    /// Body text, captured only for HTML answers to a ranged GET.
    pub html_body: Option<String>,
}

impl ProbeResponse {
    /// True when the server answered with an HTML page.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }

    /// Final extension for content served from `url`.
    #[must_use]
    pub fn extension_for(&self, url: &str) -> String {
        choose_extension(
            self.disposition_name.as_deref(),
            url,
            self.content_type.as_deref(),
        )
    }
}

/// A concrete fetch the transfer executor can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    /// URL to GET.
    pub url: String,
    /// Expected total size, when known.
    pub expected_size: Option<u64>,
    /// Whether the server advertised byte ranges.
    pub accepts_ranges: bool,
    /// Extension (with dot) for the final file.
    pub extension: String,
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Final file path.
    pub path: PathBuf,
    /// Size of the final file.
    pub bytes: u64,
    /// Whether earlier partial data was kept and extended.
    pub resumed: bool,
}

/// Path of the in-progress file for a destination stem.
#[must_use]
pub fn partial_path_for(stem: &Path) -> PathBuf {
    path_with_suffix(stem, &format!(".{PARTIAL_SUFFIX}"))
}

/// Final path for a destination stem and extension (with leading dot).
#[must_use]
pub fn final_path_for(stem: &Path, extension: &str) -> PathBuf {
    path_with_suffix(stem, extension)
}

fn path_with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = stem.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// HTTP client shared by resolvers and the transfer executor.
///
/// Create once per run and clone freely; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default timeouts (30s connect, 300s per read).
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a client with explicit timeouts.
    ///
    /// The read timeout applies per read, so multi-gigabyte transfers are not
    /// cut off as long as bytes keep flowing.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialised.
    pub fn with_timeouts(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// Probes with HEAD, falling back to a ranged GET when HEAD is refused.
    ///
    /// # Errors
    ///
    /// Network failures, access denial, and error statuses from the fallback GET.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn probe(&self, url: &str) -> Result<ProbeResponse, TransferError> {
        match self.probe_head(url).await {
            Ok(probe) => Ok(probe),
            Err(TransferError::HttpStatus { status, .. } | TransferError::AccessDenied { status, .. }) => {
                debug!(status, "HEAD refused; probing with ranged GET");
                self.probe_range(url).await
            }
            Err(other) => Err(other),
        }
    }

    /// Probes with `HEAD`.
    ///
    /// # Errors
    ///
    /// Network failures and non-success statuses.
    pub async fn probe_head(&self, url: &str) -> Result<ProbeResponse, TransferError> {
        let response = self.send(self.client.head(url), url).await?;
        let mut probe = probe_from_headers(&response);
        // Some stacks report a zero length on HEAD; treat it as unknown.
        if probe.total_size == Some(0) {
            probe.total_size = None;
        }
        Ok(probe)
    }

    /// Probes with `GET` and `Range: bytes=0-0`, capturing HTML bodies.
    ///
    /// # Errors
    ///
    /// Network failures and non-success statuses.
    pub async fn probe_range(&self, url: &str) -> Result<ProbeResponse, TransferError> {
        let request = self.client.get(url).header(RANGE, "bytes=0-0");
        let response = self.send(request, url).await?;
        let mut probe = probe_from_headers(&response);
        if probe.is_html() {
            probe.html_body = Some(read_capped_body(response, url).await?);
        }
        Ok(probe)
    }

    /// Fetches a small text document (submission sheets).
    ///
    /// # Errors
    ///
    /// Network failures and non-success statuses.
    pub async fn get_text(&self, url: &str) -> Result<String, TransferError> {
        let response = self.get(url, 0).await?;
        response
            .text()
            .await
            .map_err(|e| TransferError::network(url, e))
    }

    /// Streams `target` into `<stem>.part`, verifies it, and renames it into place.
    ///
    /// Existing partial data is extended with a `Range` request when the target
    /// accepts ranges, and discarded otherwise. A short transfer keeps its
    /// partial data for the next attempt.
    ///
    /// # Errors
    ///
    /// Network and status failures, size mismatches, and filesystem errors.
    #[instrument(skip(self, target), fields(url = %target.url, stem = %stem.display()))]
    pub async fn transfer(
        &self,
        target: &FetchTarget,
        stem: &Path,
    ) -> Result<TransferReport, TransferError> {
        let final_path = final_path_for(stem, &target.extension);
        let partial_path = partial_path_for(stem);

        if let Some(parent) = stem.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::io(parent, e))?;
        }

        let existing = tokio::fs::metadata(&partial_path)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        let mut offset = if target.accepts_ranges { existing } else { 0 };
        if existing > 0 && offset == 0 {
            debug!(existing, "discarding partial data; server does not accept ranges");
        }
        if let Some(expected) = target.expected_size {
            if offset > 0 && offset == expected {
                debug!("partial file already complete");
                return finalize(&partial_path, &final_path, expected, true).await;
            }
            if offset > expected {
                offset = 0;
            }
        }

        let response = match self.get(&target.url, offset).await {
            Err(TransferError::HttpStatus { status: 416, .. }) if offset > 0 => {
                debug!(offset, "range not satisfiable; restarting from zero");
                offset = 0;
                self.get(&target.url, 0).await?
            }
            other => other?,
        };

        let status = response.status().as_u16();
        let appending = offset > 0 && status == 206;
        if appending && content_range_start(&response).is_some_and(|start| start != offset) {
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(TransferError::integrity(
                &partial_path,
                offset,
                content_range_start(&response).unwrap_or(0),
            ));
        }
        if offset > 0 && !appending {
            debug!(status, "server ignored range request; restarting from zero");
            offset = 0;
        }

        let expected = target
            .expected_size
            .or_else(|| total_size_from_response(&response, offset));

        let mut file = if appending {
            OpenOptions::new()
                .append(true)
                .open(&partial_path)
                .await
                .map_err(|e| TransferError::io(&partial_path, e))?
        } else {
            File::create(&partial_path)
                .await
                .map_err(|e| TransferError::io(&partial_path, e))?
        };

        let written = stream_to_file(&mut file, response, &target.url, &partial_path).await?;
        file.sync_all()
            .await
            .map_err(|e| TransferError::io(&partial_path, e))?;
        drop(file);

        let total = offset.saturating_add(written);
        if let Some(expected) = expected
            && total != expected
        {
            if total > expected {
                let _ = tokio::fs::remove_file(&partial_path).await;
            }
            return Err(TransferError::integrity(&partial_path, expected, total));
        }

        finalize(&partial_path, &final_path, total, appending).await
    }

    async fn get(&self, url: &str, offset: u64) -> Result<Response, TransferError> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        self.send(request, url).await
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, TransferError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransferError::network(url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        if matches!(status_code, 401 | 403 | 407) {
            return Err(TransferError::access_denied(url, status_code));
        }
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Err(TransferError::http_status_with_retry_after(
            url,
            status_code,
            retry_after,
        ))
    }
}

async fn finalize(
    partial_path: &Path,
    final_path: &Path,
    bytes: u64,
    resumed: bool,
) -> Result<TransferReport, TransferError> {
    tokio::fs::rename(partial_path, final_path)
        .await
        .map_err(|e| TransferError::io(final_path, e))?;
    info!(path = %final_path.display(), bytes, resumed, "transfer complete");
    Ok(TransferReport {
        path: final_path.to_path_buf(),
        bytes,
        resumed,
    })
}

async fn stream_to_file(
    file: &mut File,
    response: Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, TransferError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| TransferError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| TransferError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| TransferError::io(file_path, e))?;
    Ok(bytes_written)
}

async fn read_capped_body(response: Response, url: &str) -> Result<String, TransferError> {
    let mut stream = response.bytes_stream();
    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| TransferError::network(url, e))?;
        let room = MAX_PROBE_BODY_BYTES.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= MAX_PROBE_BODY_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn probe_from_headers(response: &Response) -> ProbeResponse {
    let headers = response.headers();
    let header_str = |name: HeaderName| header_value(headers, name);

    let status = response.status().as_u16();
    let content_range_total = header_str(CONTENT_RANGE).and_then(parse_content_range_total);
    let content_length = header_str(CONTENT_LENGTH).and_then(|v| v.trim().parse::<u64>().ok());
    let accepts_ranges = status == 206
        || header_str(ACCEPT_RANGES).is_some_and(|v| v.trim().eq_ignore_ascii_case("bytes"));
    let total_size = if status == 206 {
        content_range_total
    } else {
        content_length
    };

    ProbeResponse {
        final_url: response.url().clone(),
        status,
        total_size,
        accepts_ranges,
        content_type: header_str(CONTENT_TYPE).map(str::to_string),
        disposition_name: header_str(CONTENT_DISPOSITION).and_then(parse_content_disposition),
        html_body: None,
    }
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn total_size_from_response(response: &Response, offset: u64) -> Option<u64> {
    let headers = response.headers();
    if response.status().as_u16() == 206
        && let Some(total) = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
    {
        return Some(total);
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|len| offset.saturating_add(len))
}

fn content_range_start(response: &Response) -> Option<u64> {
    let value = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    let range = value.trim().strip_prefix("bytes ")?;
    range.split('-').next()?.trim().parse().ok()
}

/// Total from `Content-Range: bytes 0-0/1234`; `None` for `*`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}
