use thiserror::Error;

/// Failures turning a provider body into a ranking record.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("response body is not the expected shape: {0}")]
    Malformed(String),

    #[error("response body is missing search information")]
    MissingSearchInformation,

    #[error("provider error {code}: {message}")]
    Provider { code: i64, message: String },
}
