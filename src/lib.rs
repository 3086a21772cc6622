// src/lib.rs
//! Frontend Monitor Library
//!
//! Core of a web page telemetry SDK: global error capture, bounded session
//! recording, session replay, and upload orchestration. The DOM capture and
//! replay engines, the global error hooks and key-value storage are host
//! capabilities reached through traits.
//!
//! # Architecture
//!
//! - **capture**: recorded event model and the capture subscription boundary
//! - **recording**: bounded, deduplicating event buffer and recorder
//! - **tracking**: global error hooks and normalized error records
//! - **replay**: replay state machine over a replay backend
//! - **upload**: HTTP transport, batch uploader, auto-upload timer
//! - **monitor**: the orchestrator tying the pieces together
//! - **observability**: tracing and metrics setup
//! - **utils**: configuration, errors, operation outcomes

// Public module exports
pub mod capture;
pub mod monitor;
pub mod observability;
pub mod recording;
pub mod replay;
pub mod tracking;
pub mod upload;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use capture::{CaptureSource, ChannelCapture, EventType, RecordedEvent};
pub use monitor::{Collaborators, FrontendMonitor, MonitorCallbacks};
pub use recording::{EventRecorder, KeyValueStore, MemoryStore, SqliteStore};
pub use replay::{ReplayBackend, ReplayCallbacks, ReplayContainer, ReplayEngine, ReplayState};
pub use tracking::{ErrorCapture, ErrorHooks, ErrorRecord, HookRegistry, NativeSignal};
pub use upload::{HttpTransport, Transport, Uploader};
pub use utils::config::MonitorConfig;
pub use utils::errors::{MonitorError, Result};
pub use utils::outcome::Outcome;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
