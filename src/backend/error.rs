//! Tagged outcomes of calls to the hub backend

use thiserror::Error;

/// Failure of a single backend call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Transport failure or timeout; the backend may not have seen the request
    #[error("failed to execute request: {0}")]
    Unavailable(String),

    /// The backend answered with a non-2xx status
    #[error("backend API error: status {status}, body: {body}")]
    Rejected { status: u16, body: String },

    /// Request body could not be encoded or the response could not be decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    /// Short outcome label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Unavailable(_) => "unavailable",
            BackendError::Rejected { .. } => "rejected",
            BackendError::Serialization(_) => "serialization",
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Serialization(format!("failed to decode response: {}", e))
        } else if e.is_timeout() {
            BackendError::Unavailable(format!("request timeout: {}", e))
        } else {
            BackendError::Unavailable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Serialization(e.to_string())
    }
}
