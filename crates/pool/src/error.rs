//! Error kinds and upstream failure classification.

use parser::ParseError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a lookup failure. Drives both the retry decision inside
/// the pool and the status mapping at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad credential format, malformed request, or upstream HTTP 400.
    InvalidRequest,
    /// Upstream rejected the credential.
    Unauthorized,
    /// Provider signalled a daily/monthly quota limit.
    QuotaExceeded,
    /// Provider throttled the credential.
    RateLimited,
    /// Local abort deadline reached.
    Timeout,
    /// Transport failure or an upstream 5xx.
    NetworkError,
    /// Response body could not be turned into a ranking record.
    ParseError,
    Unknown,
    /// No credential satisfies selection.
    AllExhausted,
}

impl ErrorKind {
    /// Whether the pool should rotate to another credential and retry.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::Timeout
                | ErrorKind::NetworkError
                | ErrorKind::ParseError
                | ErrorKind::QuotaExceeded
        )
    }

    /// Stable machine-readable code for API replies.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::ParseError => "PARSE_ERROR",
            ErrorKind::Unknown => "UNKNOWN",
            ErrorKind::AllExhausted => "ALL_KEYS_EXHAUSTED",
        }
    }
}

/// A failed lookup, tagged with its category and the credential that
/// served the attempt (absent for user-supplied keys).
#[derive(Debug, Clone, Error)]
#[error("{}: {}", .kind.code(), .message)]
pub struct TrackError {
    pub kind: ErrorKind,
    pub message: String,
    pub credential_id: Option<String>,
}

impl TrackError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            credential_id: None,
        }
    }

    pub fn with_credential(mut self, id: impl Into<String>) -> Self {
        self.credential_id = Some(id.into());
        self
    }

    pub fn all_exhausted(provider: parser::Provider) -> Self {
        Self::new(
            ErrorKind::AllExhausted,
            format!("no available credential for provider {provider}"),
        )
    }
}

impl From<ParseError> for TrackError {
    fn from(err: ParseError) -> Self {
        match &err {
            // A 2xx body carrying an explicit provider error block is
            // classified like the equivalent HTTP failure.
            ParseError::Provider { code, message } => {
                TrackError::new(classify_response(*code as u16, message), err.to_string())
            }
            _ => TrackError::new(ErrorKind::ParseError, err.to_string()),
        }
    }
}

/// Classify an upstream failure from its HTTP status and message text.
///
/// Message keywords take precedence over the raw status for throttling
/// and quota signals because providers report those through both 403 and
/// 429 with inconsistent bodies. "rate limit" is checked before the
/// generic quota keywords since the latter also match on "limit".
pub fn classify_response(status: u16, message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();

    if status == 429 || lower.contains("rate limit") || lower.contains("too many") {
        return ErrorKind::RateLimited;
    }
    if lower.contains("quota")
        || lower.contains("limit")
        || lower.contains("exceeded")
        || lower.contains("used up")
    {
        return ErrorKind::QuotaExceeded;
    }
    match status {
        400 => ErrorKind::InvalidRequest,
        401 | 403 => ErrorKind::Unauthorized,
        500..=599 => ErrorKind::NetworkError,
        _ => ErrorKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limited() {
        assert_eq!(classify_response(429, ""), ErrorKind::RateLimited);
    }

    #[test]
    fn rate_limit_keywords_beat_quota_keywords() {
        assert_eq!(
            classify_response(403, "Rate limit exceeded for this key"),
            ErrorKind::RateLimited
        );
        assert_eq!(
            classify_response(200, "too many requests"),
            ErrorKind::RateLimited
        );
    }

    #[test]
    fn quota_keywords_mark_exhaustion() {
        assert_eq!(
            classify_response(403, "Daily quota reached"),
            ErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify_response(200, "monthly searches used up"),
            ErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify_response(403, "Daily Limit Exceeded"),
            ErrorKind::QuotaExceeded
        );
    }

    #[test]
    fn plain_statuses_map_directly() {
        assert_eq!(classify_response(400, "bad"), ErrorKind::InvalidRequest);
        assert_eq!(classify_response(401, "no"), ErrorKind::Unauthorized);
        assert_eq!(classify_response(503, "down"), ErrorKind::NetworkError);
        assert_eq!(classify_response(418, "teapot"), ErrorKind::Unknown);
    }

    #[test]
    fn retryable_set_matches_rotation_policy() {
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::NetworkError.is_retryable());
        assert!(ErrorKind::ParseError.is_retryable());
        assert!(ErrorKind::QuotaExceeded.is_retryable());
        assert!(!ErrorKind::InvalidRequest.is_retryable());
        assert!(!ErrorKind::Unauthorized.is_retryable());
        assert!(!ErrorKind::AllExhausted.is_retryable());
    }
}
