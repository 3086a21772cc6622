// src/observability/mod.rs
//! Logging and metrics setup
//!
//! Every captured error is surfaced through `tracing` in addition to the
//! user callback, and the hot paths bump the counters named below.

use crate::utils::config::{LogFormat, LoggingConfig};
use crate::utils::errors::{MonitorError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Events appended to a recorder buffer
pub const EVENTS_RECORDED: &str = "frontend_monitor_events_recorded_total";

/// Events dropped as consecutive duplicates
pub const EVENTS_DUPLICATE: &str = "frontend_monitor_events_duplicate_total";

/// Recordings halted because the buffer was full
pub const BUFFER_FULL_STOPS: &str = "frontend_monitor_buffer_full_stops_total";

/// Errors captured, labelled by `kind`
pub const ERRORS_CAPTURED: &str = "frontend_monitor_errors_captured_total";

/// Uploads accepted by the endpoint, labelled by `type`
pub const UPLOADS_SUCCEEDED: &str = "frontend_monitor_uploads_succeeded_total";

/// Uploads that failed or were rejected, labelled by `type`
pub const UPLOADS_FAILED: &str = "frontend_monitor_uploads_failed_total";

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| MonitorError::ObservabilityFailed(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    result.map_err(|e| MonitorError::ObservabilityFailed(format!("Tracing init failed: {}", e)))
}

/// Install the Prometheus metrics recorder
///
/// The returned handle renders the current counters in text exposition format.
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MonitorError::ObservabilityFailed(format!("Metrics init failed: {}", e)))
}
