//! Error types for skc-client
//!
//! Every API function, the callback handler and the workflow controller
//! report failures through the single [`ApiError`] channel.

use std::time::Duration;

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request never reached the server or no response came back
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response, or a 2xx body shaped `{success: false, error}`
    #[error("Server error {status}: {message}")]
    Server {
        status: u16,
        message: String,
        body: Option<String>,
    },

    /// Bad user input: missing token, OAuth error parameter, unusable file
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not allowed in the current workflow or session state
    #[error("Logic error: {0}")]
    Logic(String),

    /// Analysis did not complete within the polling budget
    #[error("Analysis timed out after {0:?}")]
    Timeout(Duration),

    /// Workflow was reset or logged out while the operation was pending
    #[error("Operation cancelled")]
    Cancelled,

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// skc-common error
    #[error("Common error: {0}")]
    Common(#[from] skc_common::Error),
}

impl ApiError {
    /// HTTP status for server errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else if err.is_timeout() {
            ApiError::Network(format!("request timed out: {}", err))
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}

/// Result type for client operations
pub type ApiResult<T> = Result<T, ApiError>;
