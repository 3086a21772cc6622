// src/replay/backend.rs
//! Replay capability boundary
//!
//! The DOM replayer itself lives outside this crate. The engine only needs to
//! build one over an event sequence, drive it, and hear when it finishes.

use crate::capture::event::RecordedEvent;
use crate::utils::errors::Result;
use std::sync::Arc;

/// Runtime replayer settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayerConfig {
    pub speed: f64,
}

/// Invoked once when the replayer reaches the end of its sequence
pub type FinishCallback = Box<dyn FnOnce() + Send>;

/// A constructed replayer bound to one container
///
/// `play`, `pause` and `set_config` on an active replayer are driven while the
/// engine holds its session lock; they must not call back into the engine
/// synchronously. `construct` and the first `play` run unlocked.
pub trait Replayer: Send {
    fn play(&mut self);

    fn pause(&mut self);

    fn set_config(&mut self, config: ReplayerConfig);

    fn on_finish(&mut self, callback: FinishCallback);
}

/// Builds replayers
pub trait ReplayBackend: Send + Sync {
    fn construct(
        &self,
        events: Arc<[RecordedEvent]>,
        root: Arc<dyn ReplayContainer>,
        config: ReplayerConfig,
    ) -> Result<Box<dyn Replayer>>;
}

/// Element the replay renders into
pub trait ReplayContainer: Send + Sync {
    fn id(&self) -> &str;

    /// Scrollable ancestor used by auto-scroll (the document scroll root)
    fn scroll_root(&self) -> Option<Arc<dyn ScrollSurface>>;
}

/// Scroll position of a scrollable element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn at_bottom(&self) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height
    }
}

pub trait ScrollSurface: Send + Sync {
    fn metrics(&self) -> ScrollMetrics;

    fn scroll_by(&self, delta: f64);
}
