//! Error types for deepflect-core

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::util::compact_text;

/// Result type alias using deepflect-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Prefix some backends put in front of their exception messages.
const EXCEPTION_PREFIX: &str = "Exception: ";

/// Errors that can occur in deepflect-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Client-side form check failed; no request was sent
    #[error("{0}")]
    Validation(String),

    /// Missing, expired or rejected credentials
    #[error("Session error: {0}")]
    Session(String),

    /// The backend refused access outright (HTTP 403); never retried
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Transport-level failure, no usable response
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Non-success response carrying a message
    #[error("{message} ({status})")]
    Server { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Invalid response payload: {0}")]
    InvalidPayload(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Key-value persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Text suitable for a banner or alert, with a known exception prefix unwrapped.
    pub fn user_message(&self) -> String {
        let rendered = match self {
            Self::Validation(message) | Self::Session(message) | Self::Forbidden(message) => {
                message.clone()
            }
            Self::Server { message, .. } => message.clone(),
            other => other.to_string(),
        };
        unwrap_exception_prefix(&rendered).to_string()
    }

    /// True when the user has to log in again to continue.
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

impl From<reqwest::Error> for Error {
    /// A body that arrived but failed to decode is a payload problem, not a
    /// transport one.
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidPayload(error.to_string())
        } else {
            Self::Network(error)
        }
    }
}

pub fn unwrap_exception_prefix(message: &str) -> &str {
    let trimmed = message.trim();
    trimmed.strip_prefix(EXCEPTION_PREFIX).unwrap_or(trimmed)
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Builds a `Server` error from a failed response body.
///
/// Prefers the `message` then `error` fields of a JSON body and falls back to
/// `fallback` when neither is present.
pub(crate) fn server_error(status: StatusCode, body: &str, fallback: &str) -> Error {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|payload| payload.message.or(payload.error))
        .map(|message| compact_text(&message))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| fallback.to_string());

    Error::Server {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_prefers_message_then_error_field() {
        let error = server_error(
            StatusCode::BAD_REQUEST,
            r#"{"message":"Email already used","error":"Bad Request"}"#,
            "Registration failed",
        );
        assert_eq!(error.user_message(), "Email already used");

        let error = server_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Bad Request"}"#,
            "Registration failed",
        );
        assert_eq!(error.user_message(), "Bad Request");
    }

    #[test]
    fn server_error_falls_back_for_non_json_bodies() {
        let error = server_error(StatusCode::BAD_GATEWAY, "<html>oops</html>", "Login failed");
        assert_eq!(error.to_string(), "Login failed (502)");
    }

    #[test]
    fn user_message_unwraps_exception_prefix() {
        let error = Error::Server {
            status: 500,
            message: "Exception: file too large".to_string(),
        };
        assert_eq!(error.user_message(), "file too large");
    }

    #[test]
    fn only_session_errors_require_login() {
        assert!(Error::Session("expired".to_string()).requires_login());
        assert!(!Error::Forbidden("nope".to_string()).requires_login());
    }
}
