// ABOUTME: Error types for the Google Cloud REST backend with SNAFU pattern.
// ABOUTME: Setup failures are GcpError; per-request failures become ApiError.

use reqwest::StatusCode;
use serde::Deserialize;
use snafu::Snafu;

use crate::backend::{ApiCode, ApiError};

/// Failure to construct a client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GcpError {
    #[snafu(display("failed to initialize Google Cloud credentials: {source}"))]
    Credentials { source: gcp_auth::Error },

    #[snafu(display("failed to build HTTP client: {source}"))]
    HttpClient { source: reqwest::Error },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Convert a non-success response into an `ApiError`.
///
/// Google bodies look like `{"error":{"code":404,"message":"...","status":"NOT_FOUND"}}`.
/// Cloud Storage omits `status`, so the HTTP status decides the code there.
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> ApiError {
    let fallback = ApiCode::from_http(status.as_u16());
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let code = parsed
                .error
                .status
                .as_deref()
                .and_then(ApiCode::from_status)
                .unwrap_or(fallback);
            let message = if parsed.error.message.is_empty() {
                status.to_string()
            } else {
                parsed.error.message
            };
            ApiError::new(code, message)
        }
        Err(_) if body.trim().is_empty() => ApiError::new(fallback, status.to_string()),
        Err(_) => ApiError::new(fallback, format!("{status}: {}", body.trim())),
    }
}

/// Convert a transport failure (no usable response) into an `ApiError`.
pub(crate) fn error_from_transport(err: reqwest::Error) -> ApiError {
    let code = if err.is_timeout() {
        ApiCode::DeadlineExceeded
    } else if err.is_decode() {
        ApiCode::Internal
    } else {
        ApiCode::Unavailable
    };
    ApiError::new(code, err.to_string())
}
