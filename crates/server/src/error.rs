use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pool::{ErrorKind, TrackError};
use serde_json::json;

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Lookup failed: {0}")]
    Track(#[from] TrackError),

    #[error("Storage error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Not found")]
    NotFound,
}

impl ServerError {
    /// Get HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Track(err) => match err.kind {
                ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::QuotaExceeded
                | ErrorKind::NetworkError
                | ErrorKind::ParseError => StatusCode::BAD_GATEWAY,
                ErrorKind::AllExhausted => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::Track(err) => err.kind.code(),
            ServerError::Store(_) => "STORAGE_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }

    /// Upstream cause, included in replies only in development mode.
    fn cause(&self) -> Option<String> {
        match self {
            ServerError::Track(err) => Some(err.message.clone()),
            ServerError::Store(err) => Some(err.to_string()),
            _ => None,
        }
    }

    /// Build the JSON error body; `dev_mode` attaches the upstream cause.
    pub fn into_response_with(self, dev_mode: bool) -> Response {
        let status = self.status_code();
        let error_code = self.error_code().to_string();
        let message = self.to_string();
        let cause = if dev_mode { self.cause() } else { None };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });
        if let Some(cause) = cause {
            body["error"]["cause"] = json!(cause);
        }

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(err: std::net::AddrParseError) -> Self {
        ServerError::Internal(format!("Invalid address: {err}"))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("IO error: {err}"))
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}
