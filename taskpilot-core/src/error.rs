//! Error types for taskpilot-core

use std::time::Duration;

use thiserror::Error;

use crate::schema::ValidationErrors;
use crate::template::TemplateError;

/// Main error type for the taskpilot-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A flow definition is inconsistent (schema or template)
    #[error("flow `{flow}` is invalid: {message}")]
    FlowDefinition { flow: String, message: String },

    /// Template compilation error
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// AI flow invocation error
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// REST backend error
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Task import error
    #[error("failed to import tasks: {0}")]
    Import(String),

    /// Local input rejected before reaching the backend
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Task not found
    #[error("task not found: {0}")]
    TaskNotFound(u64),

    /// Milestone not found on a task
    #[error("milestone {milestone} not found on task {task}")]
    MilestoneNotFound { task: u64, milestone: u64 },
}

/// Result type alias for taskpilot-core
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single flow invocation.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Caller-supplied input does not satisfy the flow's input schema
    #[error("invalid flow input: {0}")]
    InvalidInput(ValidationErrors),

    /// The model answered with something that violates the output schema
    #[error("invalid model output: {0}")]
    InvalidOutput(ValidationErrors),

    /// The model provider could not be reached or refused to answer
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Failure reported by a [`crate::model::ModelInvoker`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Connection or transport failure
    #[error("model request failed: {0}")]
    Network(String),

    /// No answer within the configured timeout
    #[error("model request timed out after {0:?}")]
    Timeout(Duration),

    /// Provider answered with an error status or a safety block
    #[error("model provider rejected the request: {0}")]
    Rejected(String),

    /// Provider envelope did not contain the generated text
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Error returned by the REST backend, classified by HTTP status.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct BackendError {
    /// HTTP status, `None` for transport failures
    pub status: Option<u16>,
    /// User-facing message
    pub message: String,
    /// Machine-readable code from the response body
    pub code: String,
    /// 5xx, 429 and network failures may succeed when re-triggered
    pub retryable: bool,
    /// Extra details from the response body
    pub details: Option<serde_json::Value>,
}

impl BackendError {
    /// Build an error from a non-success status and the (optional) JSON body.
    pub fn from_status(status: u16, body: Option<&serde_json::Value>) -> Self {
        let body_message = body
            .and_then(|b| b.get("errorMessage"))
            .and_then(|v| v.as_str())
            .map(ToString::to_string);
        let message = body_message.unwrap_or_else(|| default_status_message(status));
        let code = body
            .and_then(|b| b.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("UNKNOWN_ERROR")
            .to_string();
        let details = body.and_then(|b| b.get("details")).cloned();

        Self {
            status: Some(status),
            message,
            code,
            retryable: status >= 500 || status == 429,
            details,
        }
    }

    /// Transport-level failure: no response was received.
    pub fn network() -> Self {
        Self {
            status: None,
            message: "Network Error - Please check your internet connection".to_string(),
            code: "NETWORK_ERROR".to_string(),
            retryable: true,
            details: None,
        }
    }

    /// Success status, but the body is not the expected JSON.
    pub fn malformed(status: u16, detail: impl std::fmt::Display) -> Self {
        Self {
            status: Some(status),
            message: format!("Unexpected response from server: {}", detail),
            code: "INVALID_RESPONSE".to_string(),
            retryable: false,
            details: None,
        }
    }

    /// True when the backend rejected the session token.
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

fn default_status_message(status: u16) -> String {
    match status {
        400 => "Invalid request".to_string(),
        401 => "Session expired - Please login again".to_string(),
        403 => "Unauthorized access".to_string(),
        404 => "Resource not found. Please use correct credentials.".to_string(),
        408 => "Request timeout".to_string(),
        409 => "Conflict occurred".to_string(),
        429 => "Too many requests - Please try again later".to_string(),
        500 => "Server error - Our team is working on it".to_string(),
        503 => "Service unavailable - Maintenance in progress".to_string(),
        other => format!("Unexpected error ({})", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert!(BackendError::from_status(500, None).retryable);
        assert!(BackendError::from_status(503, None).retryable);
        assert!(BackendError::from_status(429, None).retryable);
        assert!(!BackendError::from_status(400, None).retryable);
        assert!(!BackendError::from_status(404, None).retryable);
        assert!(BackendError::network().retryable);
    }

    #[test]
    fn test_body_message_wins_over_default() {
        let body = json!({"errorMessage": "title is required", "code": "VALIDATION"});
        let err = BackendError::from_status(400, Some(&body));
        assert_eq!(err.message, "title is required");
        assert_eq!(err.code, "VALIDATION");

        let err = BackendError::from_status(418, None);
        assert_eq!(err.message, "Unexpected error (418)");
        assert_eq!(err.code, "UNKNOWN_ERROR");
    }

    #[test]
    fn test_unauthorized() {
        assert!(BackendError::from_status(401, None).is_unauthorized());
        assert!(!BackendError::network().is_unauthorized());
    }
}
