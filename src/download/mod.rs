//! Transfer layer: probing, resumable streamed downloads, and retry policy.
//!
//! # Features
//!
//! - Streaming writes into a `.part` sibling, renamed atomically on success
//! - Resume from the last written byte when the server accepts ranges
//! - Size validation against the probed or advertised length
//! - Extension derivation from Content-Disposition, URL, or content type
//! - Retry classification with exponential backoff and Retry-After support
//!
//! # Example
//!
//! ```no_run
//! use festival_fetch::download::{FetchTarget, HttpClient};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let target = FetchTarget {
//!     url: "https://example.com/trailer.mp4".to_string(),
//!     expected_size: None,
//!     accepts_ranges: false,
//!     extension: ".mp4".to_string(),
//! };
//! let report = client
//!     .transfer(&target, Path::new("./out/Film/Trailer/Film_trailer"))
//!     .await?;
//! println!("saved {}", report.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
pub mod filename;
mod retry;

pub use client::{
    FetchTarget, HttpClient, ProbeResponse, TransferReport, final_path_for, partial_path_for,
};
pub use error::TransferError;
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_transfer_error,
    parse_retry_after,
};
