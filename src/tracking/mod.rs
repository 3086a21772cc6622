// src/tracking/mod.rs
//! Runtime error tracking
//!
//! - **Hooks**: host boundary for the three global error signals
//! - **Record**: closed union of normalized error shapes
//! - **Error Capture**: normalization, log, callback forwarding

pub mod error_capture;
pub mod hooks;
pub mod record;

pub use error_capture::{normalize, ErrorCallback, ErrorCapture};
pub use hooks::{
    ElementKind, ErrorHooks, HookKind, HookRegistry, NativeSignal, ResourceTarget, SignalHandler,
};
pub use record::{ErrorKind, ErrorRecord};
