// src/recording/mod.rs
//! Behavior recording
//!
//! - **Buffer**: bounded event buffer with consecutive-duplicate suppression
//! - **Recorder**: capture subscription, emit handler, status notifications
//! - **Storage**: key-value persistence (in-memory and SQLite)
//!
//! # Architecture
//!
//! ```text
//! CaptureSource ──channel──► pump task ──► record(event)
//!                                             │
//!                          ┌──────────────────┼───────────────────┐
//!                          ▼                  ▼                   ▼
//!                     buffer full         duplicate           accepted
//!                 (stop + unsubscribe)    (dropped)      (append + callback)
//! ```

pub mod buffer;
pub mod recorder;
pub mod storage;

// Re-export commonly used types
pub use buffer::{BufferStats, EventBuffer, DEFAULT_MAX_EVENTS};
pub use recorder::{
    EventCallback, EventRecorder, LoadMode, RecorderCallbacks, RecorderConfig, RecordingState,
    RecordingStatus, StatusCallback,
};
pub use storage::{
    KeyValueStore, MemoryStore, SqliteStore, StorageBackend, StorageConfig, RECORDER_EVENTS_KEY,
    SESSION_EVENTS_KEY,
};
