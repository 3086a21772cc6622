// src/replay/mod.rs
//! Session replay
//!
//! - **Backend**: the replayer capability the engine drives
//! - **Engine**: start/pause/resume/stop state machine and lifecycle callbacks
//! - **Auto Scroll**: keeps the document scrolled to the bottom during replay

pub mod auto_scroll;
pub mod backend;
pub mod engine;

pub use backend::{
    FinishCallback, ReplayBackend, ReplayContainer, Replayer, ReplayerConfig, ScrollMetrics,
    ScrollSurface,
};
pub use engine::{ReplayCallbacks, ReplayConfig, ReplayEngine, ReplayHook, ReplayState};
