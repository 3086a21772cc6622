// src/main.rs
//! Frontend Monitor uploader
//!
//! Ships the session saved by a monitor (`userBehaviorEvents`) from the
//! configured store to the collector endpoint as one `events` batch.

use anyhow::{bail, Context, Result};
use frontend_monitor::observability::{init_metrics, init_tracing};
use frontend_monitor::recording::storage::{self, open_store, SESSION_EVENTS_KEY};
use frontend_monitor::upload::{HttpTransport, UploadKind, Uploader};
use frontend_monitor::utils::config::MonitorConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first: it carries the logging settings
    let config = MonitorConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging)?;
    let metrics = init_metrics()?;

    info!("Starting Frontend Monitor uploader v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration loaded: {:?}", config);

    let Some(endpoint) = config.upload_endpoint.clone() else {
        bail!("upload_endpoint is not configured");
    };

    let store = open_store(&config.storage).context("Failed to open event store")?;

    let Some(events) = storage::load_events(store.as_ref(), SESSION_EVENTS_KEY)? else {
        warn!("No saved session under {}", SESSION_EVENTS_KEY);
        return Ok(());
    };

    if events.is_empty() {
        warn!("Saved session is empty; nothing to upload");
        return Ok(());
    }

    let transport = HttpTransport::new(config.upload_timeout());
    let uploader = Uploader::new(Some(endpoint.clone()), Arc::new(transport));

    uploader
        .upload(UploadKind::Events, &events)
        .await
        .with_context(|| format!("Failed to upload session to {}", endpoint))?;

    info!("Uploaded {} events to {}", events.len(), endpoint);
    debug!("Metrics:\n{}", metrics.render());

    Ok(())
}
