// src/capture/mod.rs
//! DOM capture boundary
//!
//! - **Event**: the opaque, timestamped record produced by the capture engine
//! - **Source**: the subscription interface the recorder consumes, plus an
//!   in-process channel implementation for host bindings

pub mod event;
pub mod source;

pub use event::{EventType, RecordedEvent};
pub use source::{
    CaptureOptions, CaptureSource, ChannelCapture, Subscription, UnavailableCapture, Unsubscribe,
};
