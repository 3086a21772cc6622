// src/utils/errors.rs
//! Error types shared across the monitor
//!
//! Most failures inside the monitor are absorbed and logged. The variants
//! below cover what component-level APIs can still hand back to a caller:
//! collaborator failures, storage and upload errors, and setup problems.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Monitor error type
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The capture source refused or failed a subscription
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// The replay backend could not build a replayer
    #[error("Replay failed: {0}")]
    ReplayFailed(String),

    /// Error hook installation failed
    #[error("Hook installation failed: {0}")]
    HookFailed(String),

    /// Key-value store read or write failed
    #[error("Storage failed: {0}")]
    StorageFailed(String),

    /// The request never produced a response
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The endpoint answered with a non-2xx status
    #[error("Upload rejected with HTTP status {status}")]
    UploadRejected { status: u16 },

    /// Upload requested without an endpoint
    #[error("No upload endpoint configured")]
    NoEndpoint,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tracing or metrics setup failed
    #[error("Observability setup failed: {0}")]
    ObservabilityFailed(String),
}

impl From<rusqlite::Error> for MonitorError {
    fn from(e: rusqlite::Error) -> Self {
        MonitorError::StorageFailed(e.to_string())
    }
}
