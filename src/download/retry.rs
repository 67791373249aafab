//! Retry policy with exponential backoff for transient failures.
//!
//! A failed attempt is first classified into a [`FailureType`]; the
//! [`RetryPolicy`] then decides whether another attempt is allowed and how long
//! to wait before it.
//!
//! # Example
//!
//! ```
//! use festival_fetch::download::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::with_max_attempts(3);
//! match policy.should_retry(FailureType::Transient, 1, None) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("retrying in {delay:?} (attempt {attempt})");
//!     }
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::constants::MAX_RETRY_AFTER;
use super::error::TransferError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on retry: timeouts, resets, 5xx, size mismatch, extractor failure.
    Transient,
    /// Will not succeed on retry: 404, unsupported host, filesystem errors.
    Permanent,
    /// Access denied; retrying without new credentials cannot help.
    NeedsAuth,
    /// HTTP 429; retried, honouring Retry-After when present.
    RateLimited,
}

/// Decision on whether to run another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry {
        /// Backoff before the next attempt.
        delay: Duration,
        /// Number of the next attempt (1-indexed).
        attempt: u32,
    },
    /// Stop here.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Exponential backoff configuration.
///
/// `delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES + 1,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit settings. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Creates a policy with a custom attempt budget and default timing.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Replaces the jitter ceiling.
    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Maximum number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether attempt `attempt` (1-indexed, just failed) gets a successor.
    ///
    /// For rate-limited failures a server-provided `retry_after` replaces the
    /// computed backoff when it is longer.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(
        &self,
        failure_type: FailureType,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "access denied - retry without new credentials would not help"
                        .to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let mut delay = self.calculate_delay(attempt);
        if failure_type == FailureType::RateLimited
            && let Some(hint) = retry_after
        {
            delay = delay.max(hint);
        }

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let ceiling = self.max_jitter.as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Classifies a transfer error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout, network (non-TLS), integrity mismatch | Transient |
/// | 408, 5xx | Transient |
/// | 429 | `RateLimited` |
/// | Access denied (401/403/407) | `NeedsAuth` |
/// | Other 4xx, TLS, IO, invalid URL | Permanent |
#[must_use]
pub fn classify_transfer_error(error: &TransferError) -> FailureType {
    match error {
        TransferError::HttpStatus { status, .. } => classify_http_status(*status),
        TransferError::Timeout { .. } | TransferError::Integrity { .. } => FailureType::Transient,
        TransferError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        TransferError::AccessDenied { .. } => FailureType::NeedsAuth,
        TransferError::Io { .. } | TransferError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 | 407 => FailureType::NeedsAuth,
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        400..=499 => FailureType::Permanent,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

/// Parses a Retry-After value (delta seconds or HTTP-date), capped at one hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<u64>() {
        let duration = Duration::from_secs(seconds);
        if duration > MAX_RETRY_AFTER {
            warn!(seconds, "Retry-After exceeds maximum, capping at 1 hour");
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    let datetime = httpdate::parse_http_date(header_value).ok()?;
    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) => Some(duration.min(MAX_RETRY_AFTER)),
        Err(_) => Some(Duration::ZERO),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn quiet_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(100),
            Duration::from_secs(1),
            2.0,
        )
        .with_max_jitter(Duration::ZERO)
    }

    #[test]
    fn test_retry_policy_default_allows_two_retries() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = quiet_policy(10);
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
        assert_eq!(policy.calculate_delay(8), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_ceiling() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(32), 2.0);
        for _ in 0..50 {
            let delay = policy.calculate_delay(1);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_permanent_and_auth_never_retry() {
        let policy = quiet_policy(5);
        assert!(matches!(
            policy.should_retry(FailureType::Permanent, 1, None),
            RetryDecision::DoNotRetry { .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::NeedsAuth, 1, None),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_transient_retries_until_budget_exhausted() {
        let policy = quiet_policy(3);
        assert_eq!(
            policy.should_retry(FailureType::Transient, 1, None),
            RetryDecision::Retry {
                delay: Duration::from_millis(100),
                attempt: 2
            }
        );
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 3, None),
            RetryDecision::DoNotRetry { reason } if reason.contains("3")
        ));
    }

    #[test]
    fn test_rate_limited_honours_longer_retry_after() {
        let policy = quiet_policy(3);
        let decision =
            policy.should_retry(FailureType::RateLimited, 1, Some(Duration::from_secs(5)));
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_secs(5),
                attempt: 2
            }
        );
    }

    #[test]
    fn test_classify_transfer_error_statuses() {
        let url = "https://x.example/film.mov";
        assert_eq!(
            classify_transfer_error(&TransferError::http_status(url, 503)),
            FailureType::Transient
        );
        assert_eq!(
            classify_transfer_error(&TransferError::http_status(url, 404)),
            FailureType::Permanent
        );
        assert_eq!(
            classify_transfer_error(&TransferError::http_status(url, 429)),
            FailureType::RateLimited
        );
        assert_eq!(
            classify_transfer_error(&TransferError::access_denied(url, 403)),
            FailureType::NeedsAuth
        );
        assert_eq!(
            classify_transfer_error(&TransferError::timeout(url)),
            FailureType::Transient
        );
        assert_eq!(
            classify_transfer_error(&TransferError::integrity("/tmp/a.part", 10, 4)),
            FailureType::Transient
        );
        assert_eq!(
            classify_transfer_error(&TransferError::io(
                "/tmp/a",
                std::io::Error::other("disk full")
            )),
            FailureType::Permanent
        );
    }

    #[test]
    fn test_parse_retry_after_forms() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("999999"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }
}
