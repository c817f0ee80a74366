//! Central error types for the hub operator
//!
//! Uses `thiserror` for ergonomic, type-safe error handling with
//! automatic `Display` and `Error` trait implementations.

use std::time::Duration;

use thiserror::Error;

/// Central error type for the hub operator
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error from kube-rs
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Watch stream error from kube-runtime
    #[error("Watch error: {0}")]
    WatchError(#[from] kube::runtime::watcher::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration or startup error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The status subresource changed since it was read
    #[error("Status conflict for Project {name}: resource version is stale")]
    StatusConflict { name: String },

    /// A reconcile pass ran past its deadline
    #[error("Reconcile of {key} timed out after {timeout:?}")]
    ReconcileTimeout { key: String, timeout: Duration },
}

/// Result type alias for operator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Check if this error type should trigger a quick retry
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(_)
            | Error::WatchError(_)
            | Error::StatusConflict { .. }
            | Error::ReconcileTimeout { .. } => true,
            Error::SerializationError(_) | Error::ConfigError(_) => false,
        }
    }

    /// Convert to a human-readable message for status updates
    pub fn status_message(&self) -> String {
        match self {
            Error::KubeError(e) => format!("Kubernetes error: {}", e),
            Error::StatusConflict { name } => {
                format!("Status of {} was modified concurrently", name)
            }
            _ => self.to_string(),
        }
    }
}
