// src/tracking/record.rs
//! Normalized error records
//!
//! Each variant carries only what its browser signal actually provides.
//! The JSON shape matches what collectors already ingest: a `type` tag and
//! the stack trace under `error`.

use serde::{Deserialize, Serialize};

/// Kind of captured error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    JsError,
    UnhandledRejection,
    ResourceError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::JsError => "jsError",
            ErrorKind::UnhandledRejection => "unhandledrejection",
            ErrorKind::ResourceError => "resourceError",
        }
    }
}

/// One captured error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ErrorRecord {
    /// Uncaught synchronous error
    #[serde(rename = "jsError")]
    JsError {
        message: String,
        source: String,
        lineno: u32,
        colno: u32,
        #[serde(rename = "error")]
        stack: Option<String>,
    },

    /// Promise rejected without a handler
    #[serde(rename = "unhandledrejection")]
    UnhandledRejection { reason: serde_json::Value },

    /// Image, script, stylesheet or other element failed to load
    #[serde(rename = "resourceError")]
    ResourceError { target: String, source: String },
}

impl ErrorRecord {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorRecord::JsError { .. } => ErrorKind::JsError,
            ErrorRecord::UnhandledRejection { .. } => ErrorKind::UnhandledRejection,
            ErrorRecord::ResourceError { .. } => ErrorKind::ResourceError,
        }
    }
}
