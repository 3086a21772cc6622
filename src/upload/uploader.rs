// src/upload/uploader.rs
//! Batch upload of errors and events

use crate::observability::{UPLOADS_FAILED, UPLOADS_SUCCEEDED};
use crate::upload::transport::Transport;
use crate::utils::errors::{MonitorError, Result};
use chrono::{SecondsFormat, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Payload discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Errors,
    Events,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Errors => "errors",
            UploadKind::Events => "events",
        }
    }
}

/// Wire body: `{ "type", "data", "timestamp" }`
#[derive(Debug, Serialize)]
pub struct UploadPayload<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub kind: UploadKind,
    pub data: &'a [T],
    pub timestamp: String,
}

impl<'a, T: Serialize> UploadPayload<'a, T> {
    pub fn new(kind: UploadKind, data: &'a [T]) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Posts batches to the configured endpoint
#[derive(Clone)]
pub struct Uploader {
    endpoint: Option<String>,
    transport: Arc<dyn Transport>,
}

impl Uploader {
    pub fn new(endpoint: Option<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn has_endpoint(&self) -> bool {
        self.endpoint.is_some()
    }

    /// POST one batch; any non-2xx status is an error
    pub async fn upload<T: Serialize>(&self, kind: UploadKind, data: &[T]) -> Result<()> {
        let Some(endpoint) = self.endpoint.clone() else {
            warn!("Upload endpoint not configured");
            return Err(MonitorError::NoEndpoint);
        };

        let body = serde_json::to_vec(&UploadPayload::new(kind, data))?;
        debug!(kind = kind.as_str(), records = data.len(), bytes = body.len(), "Uploading batch");

        let result = match self.transport.post_json(&endpoint, body).await {
            Ok(status) if (200..300).contains(&status) => Ok(()),
            Ok(status) => Err(MonitorError::UploadRejected { status }),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => {
                counter!(UPLOADS_SUCCEEDED, "type" => kind.as_str()).increment(1);
                info!(kind = kind.as_str(), records = data.len(), "Upload succeeded");
            }
            Err(e) => {
                counter!(UPLOADS_FAILED, "type" => kind.as_str()).increment(1);
                error!(kind = kind.as_str(), "Upload failed: {}", e);
            }
        }

        result
    }

    /// Fire-and-forget upload on the current runtime
    ///
    /// Dropped with a warning when called outside a tokio runtime.
    pub fn spawn_upload<T>(&self, kind: UploadKind, data: Vec<T>)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(kind = kind.as_str(), "No async runtime; upload dropped");
                return;
            }
        };

        let uploader = self.clone();
        handle.spawn(async move {
            // failures are already logged and counted
            let _ = uploader.upload(kind, &data).await;
        });
    }
}
