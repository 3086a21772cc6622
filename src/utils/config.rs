// src/utils/config.rs
//! Monitor configuration
//!
//! Every field has a default, so an empty configuration yields a monitor that
//! captures errors and behavior but never uploads. Values can be layered from
//! an optional TOML file and `FRONTEND_MONITOR__*` environment variables.

use crate::recording::recorder::{LoadMode, RecorderConfig};
use crate::recording::storage::StorageConfig;
use crate::replay::engine::ReplayConfig;
use crate::utils::errors::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "frontend-monitor.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FRONTEND_MONITOR";

/// Top-level monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Install global error hooks
    pub error_tracker: bool,

    /// Create the behavior recorder
    pub behavior_tracker: bool,

    /// Periodically upload captured errors
    pub auto_upload_errors: bool,

    /// Auto-upload period (milliseconds)
    pub auto_upload_interval_ms: Option<u64>,

    /// Collector endpoint for JSON uploads
    pub upload_endpoint: Option<String>,

    /// Upload each record as it is captured when no callback is supplied
    pub realtime_upload: bool,

    /// Consecutive failed auto-upload attempts before a batch is dropped
    pub max_upload_retries: u32,

    /// Per-request upload timeout (milliseconds)
    pub upload_timeout_ms: u64,

    /// How `load_events` merges the saved session into the buffer
    pub session_load_mode: LoadMode,

    pub recorder: RecorderConfig,

    pub replay: ReplayConfig,

    pub storage: StorageConfig,

    pub logging: LoggingConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            error_tracker: true,
            behavior_tracker: true,
            auto_upload_errors: false,
            auto_upload_interval_ms: None,
            upload_endpoint: None,
            realtime_upload: true,
            max_upload_retries: 3,
            upload_timeout_ms: 10_000,
            session_load_mode: LoadMode::Append,
            recorder: RecorderConfig::default(),
            replay: ReplayConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from `frontend-monitor.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load from the given file (if present) and the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {:?}", path);

        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Auto-upload period, if auto-upload is enabled and a period is set
    pub fn auto_upload_interval(&self) -> Option<Duration> {
        if !self.auto_upload_errors {
            return None;
        }
        self.auto_upload_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
