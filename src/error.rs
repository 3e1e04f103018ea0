//! Error taxonomy shared by every component.
//!
//! Each component converts its own failures into one of the kinds below
//! before returning, so nothing library-specific reaches the HTTP layer.
//! The HTTP layer turns an [`Error`] into a status code plus a small JSON body
//! and logs the detail that callers do not get to see.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Crate-wide error kinds.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing caller-supplied parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Content arrived but could not be understood.
    #[error("failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    /// Missing, invalid or expired session credential, or a credential mismatch at login.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A required configuration value is absent or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Failure reaching an external source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    #[error("browser {step} step failed for {url}: {detail}")]
    Render {
        url: String,
        step: RenderStep,
        detail: String,
    },
}

impl FetchError {
    /// Classify a `reqwest` failure for `url`.
    pub fn from_reqwest(url: &str, timeout: Duration, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                detail: e.to_string(),
            }
        }
    }

    /// HTTP status attached to the failure, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The stage of a browser-rendered fetch that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStep {
    Session,
    Navigate,
    Wait,
    Capture,
}

impl fmt::Display for RenderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStep::Session => "session",
            RenderStep::Navigate => "navigate",
            RenderStep::Wait => "wait",
            RenderStep::Capture => "capture",
        };
        f.write_str(name)
    }
}

/// Failure of the upstream summarization service.
#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("summarization request failed: {0}")]
    Transport(String),

    #[error("summarization service responded with HTTP {status}")]
    Status { status: u16, body: String },

    #[error("malformed summarization response: {0}")]
    Malformed(String),

    #[error("summarization service returned no content")]
    EmptyResponse,
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn missing_config(name: &str) -> Self {
        Error::Configuration(format!("{name} is not set"))
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::Fetch(_) => "fetch_error",
            Error::Parse { .. } => "parse_error",
            Error::Summarize(_) => "summarize_error",
            Error::Unauthorized(_) => "unauthorized",
            Error::Configuration(_) => "configuration_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Fetch(_) | Error::Parse { .. } | Error::Summarize(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to an untrusted caller.
    pub fn public_message(&self) -> String {
        match self {
            Error::InvalidInput(msg) => msg.clone(),
            Error::Unauthorized(msg) => msg.clone(),
            Error::Fetch(_) => "failed to fetch source content".to_string(),
            Error::Parse { what, .. } => format!("failed to parse {what}"),
            Error::Summarize(_) => "summarization failed".to_string(),
            Error::Configuration(_) => "server configuration error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            match &self {
                Error::Summarize(SummarizeError::Status { status, body }) => error!(
                    kind = self.kind(),
                    upstream_status = *status,
                    upstream_body = %crate::utils::truncate_for_log(body, 500),
                    "Request failed"
                ),
                Error::Fetch(fetch) => error!(
                    kind = self.kind(),
                    upstream_status = fetch.status(),
                    error = %fetch,
                    "Request failed"
                ),
                _ => error!(kind = self.kind(), error = %self, "Request failed"),
            }
        } else {
            warn!(kind = self.kind(), error = %self, "Request rejected");
        }

        let body = json!({
            "error": self.kind(),
            "message": self.public_message(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_kind() {
        assert_eq!(
            Error::invalid("bad url").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Unauthorized("no cookie".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::missing_config("GEMINI_API_KEY").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::from(SummarizeError::EmptyResponse).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_message_hides_upstream_detail() {
        let err = Error::from(SummarizeError::Status {
            status: 429,
            body: "quota exhausted for key abc".into(),
        });
        assert!(!err.public_message().contains("abc"));

        let err = Error::from(FetchError::Transport {
            url: "https://internal.example".into(),
            detail: "connection refused".into(),
        });
        assert!(!err.public_message().contains("internal.example"));
    }

    #[test]
    fn test_fetch_status_is_exposed() {
        let err = FetchError::Status {
            url: "https://example.com".into(),
            status: 404,
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_render_step_display() {
        assert_eq!(RenderStep::Navigate.to_string(), "navigate");
        assert_eq!(RenderStep::Wait.to_string(), "wait");
    }
}
