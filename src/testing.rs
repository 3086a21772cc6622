// src/testing.rs
//! Scripted collaborators for unit tests

use crate::capture::event::RecordedEvent;
use crate::replay::backend::{
    FinishCallback, ReplayBackend, ReplayContainer, Replayer, ReplayerConfig, ScrollMetrics,
    ScrollSurface,
};
use crate::upload::transport::Transport;
use crate::utils::errors::{MonitorError, Result};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

type FinishSlot = Arc<Mutex<Option<FinishCallback>>>;

#[derive(Default)]
struct BackendLog {
    constructed: usize,
    plays: usize,
    pauses: usize,
    live: usize,
    last_speed: Option<f64>,
    latest_finish: Option<Weak<Mutex<Option<FinishCallback>>>>,
}

/// Replay backend that records every call and finishes on demand
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    log: Arc<Mutex<BackendLog>>,
    fail: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every construct call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn constructed(&self) -> usize {
        self.log.lock().constructed
    }

    pub fn plays(&self) -> usize {
        self.log.lock().plays
    }

    pub fn pauses(&self) -> usize {
        self.log.lock().pauses
    }

    /// Replayers constructed and not yet dropped
    pub fn live_handles(&self) -> usize {
        self.log.lock().live
    }

    pub fn last_speed(&self) -> Option<f64> {
        self.log.lock().last_speed
    }

    /// Fire the finish callback of the newest replayer
    ///
    /// Returns false when that replayer was dropped or already finished.
    pub fn finish_latest(&self) -> bool {
        let slot = self.log.lock().latest_finish.as_ref().and_then(Weak::upgrade);
        let callback = slot.and_then(|slot| slot.lock().take());

        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl ReplayBackend for ScriptedBackend {
    fn construct(
        &self,
        _events: Arc<[RecordedEvent]>,
        _root: Arc<dyn ReplayContainer>,
        config: ReplayerConfig,
    ) -> Result<Box<dyn Replayer>> {
        if self.fail {
            return Err(MonitorError::ReplayFailed("scripted construct failure".into()));
        }

        let finish: FinishSlot = Arc::new(Mutex::new(None));
        let mut log = self.log.lock();
        log.constructed += 1;
        log.live += 1;
        log.last_speed = Some(config.speed);
        log.latest_finish = Some(Arc::downgrade(&finish));

        Ok(Box::new(ScriptedReplayer {
            log: Arc::clone(&self.log),
            finish,
        }))
    }
}

struct ScriptedReplayer {
    log: Arc<Mutex<BackendLog>>,
    finish: FinishSlot,
}

impl Replayer for ScriptedReplayer {
    fn play(&mut self) {
        self.log.lock().plays += 1;
    }

    fn pause(&mut self) {
        self.log.lock().pauses += 1;
    }

    fn set_config(&mut self, config: ReplayerConfig) {
        self.log.lock().last_speed = Some(config.speed);
    }

    fn on_finish(&mut self, callback: FinishCallback) {
        *self.finish.lock() = Some(callback);
    }
}

impl Drop for ScriptedReplayer {
    fn drop(&mut self) {
        self.log.lock().live -= 1;
    }
}

/// Replay container with an optional scroll root
pub struct ScriptedContainer {
    id: String,
    scroll: Option<Arc<dyn ScrollSurface>>,
}

impl ScriptedContainer {
    pub fn new(id: &str) -> Arc<dyn ReplayContainer> {
        Arc::new(Self {
            id: id.to_string(),
            scroll: None,
        })
    }

    pub fn with_scroll(id: &str, scroll: Arc<ScriptedScroll>) -> Arc<dyn ReplayContainer> {
        Arc::new(Self {
            id: id.to_string(),
            scroll: Some(scroll as Arc<dyn ScrollSurface>),
        })
    }
}

impl ReplayContainer for ScriptedContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn scroll_root(&self) -> Option<Arc<dyn ScrollSurface>> {
        self.scroll.clone()
    }
}

struct ScrollState {
    top: f64,
    steps: usize,
}

/// Scroll surface of fixed height
pub struct ScriptedScroll {
    scroll_height: f64,
    client_height: f64,
    state: Mutex<ScrollState>,
}

impl ScriptedScroll {
    pub fn new(scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_height,
            client_height,
            state: Mutex::new(ScrollState { top: 0.0, steps: 0 }),
        }
    }

    pub fn scroll_top(&self) -> f64 {
        self.state.lock().top
    }

    pub fn steps(&self) -> usize {
        self.state.lock().steps
    }
}

impl ScrollSurface for ScriptedScroll {
    fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: self.state.lock().top,
            scroll_height: self.scroll_height,
            client_height: self.client_height,
        }
    }

    fn scroll_by(&self, delta: f64) {
        let max_top = (self.scroll_height - self.client_height).max(0.0);
        let mut state = self.state.lock();
        state.top = (state.top + delta).min(max_top);
        state.steps += 1;
    }
}

/// Transport that records posts and answers with a fixed status
#[derive(Clone)]
pub struct RecordingTransport {
    posts: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    status: Arc<Mutex<u16>>,
    calls: Arc<watch::Sender<usize>>,
    latency: Duration,
}

impl RecordingTransport {
    pub fn new(status: u16) -> Self {
        let (calls, _) = watch::channel(0);
        Self {
            posts: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(status)),
            calls: Arc::new(calls),
            latency: Duration::ZERO,
        }
    }

    /// Every response arrives `latency` after the post
    pub fn with_latency(status: u16, latency: Duration) -> Self {
        Self {
            latency,
            ..Self::new(status)
        }
    }

    pub fn set_status(&self, status: u16) {
        *self.status.lock() = status;
    }

    /// Endpoint and body of every post, in order
    pub fn posts(&self) -> Vec<(String, Vec<u8>)> {
        self.posts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.calls.subscribe();
        let _ = rx.wait_for(|calls| *calls >= n).await;
    }
}

impl Transport for RecordingTransport {
    fn post_json(&self, endpoint: &str, body: Vec<u8>) -> BoxFuture<'static, Result<u16>> {
        self.posts.lock().push((endpoint.to_string(), body));
        self.calls.send_modify(|calls| *calls += 1);
        let status = *self.status.lock();
        let latency = self.latency;

        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            Ok(status)
        })
    }
}
