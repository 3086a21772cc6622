// src/replay/auto_scroll.rs
//! Scroll-to-bottom loop run alongside a replay

use crate::replay::backend::ScrollSurface;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pixels scrolled per step
pub const SCROLL_STEP: f64 = 10.0;

/// Delay between steps
pub const SCROLL_INTERVAL: Duration = Duration::from_millis(100);

/// Scroll one step at a time until the bottom is reached or `cancel` fires
pub fn spawn_auto_scroll(surface: Arc<dyn ScrollSurface>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            if surface.metrics().at_bottom() {
                debug!("Auto-scroll reached the bottom");
                break;
            }

            surface.scroll_by(SCROLL_STEP);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(SCROLL_INTERVAL) => {}
            }
        }
    })
}
