//! Gatechat Error Types
//!
//! Every failure of a chat turn ends up as one of these. The `Display`
//! output is the text shown to the user in place of (or after) the
//! streamed reply.

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for gatechat operations
#[derive(Debug, Error)]
pub enum GateError {
    /// HTTP 401 from the webhook or the prediction endpoint
    #[error("Webhook request failed with 401 Unauthorized. Please check your credentials.")]
    Unauthorized,

    /// Any other non-2xx response
    #[error("An error occurred during the webhook request: {detail}")]
    Http { status: u16, detail: String },

    /// Transport failure (connect refused, DNS, timeout, broken body)
    #[error("An error occurred during the webhook request: {0}")]
    Network(String),

    /// Body or stream payload that is not the JSON we expect
    #[error("Invalid JSON response from webhook: {0}")]
    MalformedResponse(String),

    /// JSON parsed but a required key is absent
    #[error("Missing key in webhook response: '{0}'")]
    MissingField(String),

    /// Configuration errors (unreadable file, invalid JSON, empty URL, ...)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GateError {
    /// Build the error for a non-2xx response.
    ///
    /// `detail` is the transport's own rendering of the failure, which
    /// names both the status and the URL.
    pub fn from_status(status: StatusCode, detail: impl Into<String>) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            GateError::Unauthorized
        } else {
            GateError::Http {
                status: status.as_u16(),
                detail: detail.into(),
            }
        }
    }

    /// HTTP status associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            GateError::Unauthorized => Some(401),
            GateError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            GateError::from_status(status, err.to_string())
        } else if err.is_decode() {
            GateError::MalformedResponse(err.to_string())
        } else if err.is_timeout() {
            GateError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            GateError::Network(format!("Connection failed: {}", err))
        } else {
            GateError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::MalformedResponse(err.to_string())
    }
}

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        GateError::Config(format!("IO error: {}", err))
    }
}

/// Result type alias for gatechat operations
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_message() {
        let err = GateError::from_status(StatusCode::UNAUTHORIZED, "ignored");
        assert!(matches!(err, GateError::Unauthorized));
        assert_eq!(
            err.to_string(),
            "Webhook request failed with 401 Unauthorized. Please check your credentials."
        );
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_http_error_carries_detail() {
        let err = GateError::from_status(StatusCode::NOT_FOUND, "404 Not Found for url");
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.to_string(),
            "An error occurred during the webhook request: 404 Not Found for url"
        );
    }

    #[test]
    fn test_json_error_is_malformed() {
        let err: GateError = serde_json::from_str::<serde_json::Value>("<html>")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Invalid JSON response from webhook: "));
    }

    #[test]
    fn test_missing_field_quotes_key() {
        let err = GateError::MissingField("event".to_string());
        assert_eq!(err.to_string(), "Missing key in webhook response: 'event'");
        assert_eq!(err.status(), None);
    }
}
