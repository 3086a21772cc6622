// src/replay/engine.rs
//! Replay state machine
//!
//! ```text
//! Idle ──start──► Playing ──pause──► Paused
//!                  │  ▲                 │
//!                  │  └─────resume──────┘
//!                  ├──stop──► Stopped      (also from Paused)
//!                  └──finish─► Finished
//! ```
//!
//! `Stopped` and `Finished` are terminal for the current handle; a new
//! `start_replay` builds a fresh one. Finish signals from a handle that was
//! already stopped or replaced are ignored, so `on_end` fires once per session.

use crate::capture::event::RecordedEvent;
use crate::replay::auto_scroll::spawn_auto_scroll;
use crate::replay::backend::{ReplayBackend, ReplayContainer, Replayer, ReplayerConfig};
use crate::utils::errors::Result;
use crate::utils::outcome::Outcome;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Initial playback speed multiplier
    pub speed: f64,

    /// Scroll the document to the bottom while replaying
    pub enable_auto_scroll: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            enable_auto_scroll: false,
        }
    }
}

/// Replay lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Playing,
    Paused,
    Stopped,
    Finished,
}

impl ReplayState {
    /// A handle exists and the session can still be paused or stopped
    pub fn is_active(&self) -> bool {
        matches!(self, ReplayState::Playing | ReplayState::Paused)
    }
}

/// Lifecycle callback
pub type ReplayHook = Arc<dyn Fn() + Send + Sync>;

/// Optional per-phase callbacks
#[derive(Clone, Default)]
pub struct ReplayCallbacks {
    pub on_start: Option<ReplayHook>,
    pub on_pause: Option<ReplayHook>,
    pub on_resume: Option<ReplayHook>,
    pub on_end: Option<ReplayHook>,
}

impl fmt::Debug for ReplayCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_pause", &self.on_pause.is_some())
            .field("on_resume", &self.on_resume.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

fn fire(hook: &Option<ReplayHook>) {
    if let Some(hook) = hook {
        hook();
    }
}

struct ReplaySession {
    state: ReplayState,
    /// Bumped on every start; finish signals carry the value they were born with
    generation: u64,
    handle: Option<Box<dyn Replayer>>,
    /// A replayer is being built outside the lock
    starting: bool,
    events: Option<Arc<[RecordedEvent]>>,
    speed: f64,
    auto_scroll: Option<CancellationToken>,
}

impl ReplaySession {
    /// Drop the handle and cancel side effects
    fn teardown(&mut self) -> Option<Box<dyn Replayer>> {
        if let Some(cancel) = self.auto_scroll.take() {
            cancel.cancel();
        }
        self.handle.take()
    }
}

struct EngineInner {
    session: Mutex<ReplaySession>,
    callbacks: ReplayCallbacks,
    state_tx: watch::Sender<ReplayState>,
}

impl EngineInner {
    fn finish(&self, generation: u64) {
        let mut session = self.session.lock();

        if session.generation != generation || session.state != ReplayState::Playing {
            debug!(generation, "Ignoring stale finish signal");
            return;
        }

        session.teardown();
        session.state = ReplayState::Finished;
        self.state_tx.send_replace(ReplayState::Finished);
        drop(session);

        info!("Replay has finished");
        fire(&self.callbacks.on_end);
    }
}

/// Replay engine over a replay backend
pub struct ReplayEngine {
    inner: Arc<EngineInner>,
    backend: Arc<dyn ReplayBackend>,
    config: ReplayConfig,
}

impl ReplayEngine {
    pub fn new(backend: Arc<dyn ReplayBackend>, config: ReplayConfig, callbacks: ReplayCallbacks) -> Self {
        let (state_tx, _) = watch::channel(ReplayState::Idle);

        Self {
            inner: Arc::new(EngineInner {
                session: Mutex::new(ReplaySession {
                    state: ReplayState::Idle,
                    generation: 0,
                    handle: None,
                    starting: false,
                    events: None,
                    speed: config.speed,
                    auto_scroll: None,
                }),
                callbacks,
                state_tx,
            }),
            backend,
            config,
        }
    }

    /// Build a replayer over `events` in `container` and start playing
    ///
    /// Empty input and an in-progress replay are refused without touching the
    /// backend. Outside a tokio runtime nothing is built and `Failed` is
    /// returned. The backend is constructed and started without the session
    /// lock held.
    pub fn start_replay(
        &self,
        container: Arc<dyn ReplayContainer>,
        events: impl Into<Arc<[RecordedEvent]>>,
    ) -> Result<Outcome> {
        let events: Arc<[RecordedEvent]> = events.into();

        if events.is_empty() {
            warn!("No events to replay");
            return Ok(Outcome::RejectedEmpty);
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("Replay requires a tokio runtime");
            return Ok(Outcome::Failed);
        };

        let generation = {
            let mut session = self.inner.session.lock();
            if session.state.is_active() || session.starting {
                warn!("Replay is already in progress");
                return Ok(Outcome::RejectedInvalidState);
            }
            session.starting = true;
            session.generation += 1;
            session.generation
        };

        let config = ReplayerConfig {
            speed: self.config.speed,
        };
        let mut handle = match self
            .backend
            .construct(Arc::clone(&events), Arc::clone(&container), config)
        {
            Ok(handle) => handle,
            Err(e) => {
                self.inner.session.lock().starting = false;
                return Err(e);
            }
        };

        let (finish_tx, finish_rx) = oneshot::channel();
        handle.on_finish(Box::new(move || {
            let _ = finish_tx.send(());
        }));
        handle.play();

        let mut session = self.inner.session.lock();
        session.starting = false;

        let inner: Weak<EngineInner> = Arc::downgrade(&self.inner);
        runtime.spawn(async move {
            // errs when the handle is dropped by stop
            if finish_rx.await.is_ok() {
                if let Some(inner) = inner.upgrade() {
                    inner.finish(generation);
                }
            }
        });

        if self.config.enable_auto_scroll {
            match container.scroll_root() {
                Some(surface) => {
                    let cancel = CancellationToken::new();
                    spawn_auto_scroll(surface, cancel.clone());
                    session.auto_scroll = Some(cancel);
                }
                None => debug!(container = container.id(), "No scroll root; auto-scroll skipped"),
            }
        }

        session.handle = Some(handle);
        session.events = Some(events);
        session.speed = config.speed;
        session.state = ReplayState::Playing;
        self.inner.state_tx.send_replace(ReplayState::Playing);
        drop(session);

        info!(container = container.id(), "User behavior replay started");
        fire(&self.inner.callbacks.on_start);
        Ok(Outcome::Accepted)
    }

    pub fn pause_replay(&self) -> Outcome {
        let mut session = self.inner.session.lock();

        if session.state != ReplayState::Playing {
            debug!(state = ?session.state, "Pause ignored");
            return Outcome::RejectedInvalidState;
        }

        if let Some(handle) = session.handle.as_mut() {
            handle.pause();
        }
        session.state = ReplayState::Paused;
        self.inner.state_tx.send_replace(ReplayState::Paused);
        drop(session);

        info!("User behavior replay paused");
        fire(&self.inner.callbacks.on_pause);
        Outcome::Accepted
    }

    pub fn resume_replay(&self) -> Outcome {
        let mut session = self.inner.session.lock();

        if session.state != ReplayState::Paused {
            debug!(state = ?session.state, "Resume ignored");
            return Outcome::RejectedInvalidState;
        }

        if let Some(handle) = session.handle.as_mut() {
            handle.play();
        }
        session.state = ReplayState::Playing;
        self.inner.state_tx.send_replace(ReplayState::Playing);
        drop(session);

        info!("User behavior replay resumed");
        fire(&self.inner.callbacks.on_resume);
        Outcome::Accepted
    }

    /// Tear down the active replayer; it cannot be resumed afterwards
    pub fn stop_replay(&self) -> Outcome {
        let mut session = self.inner.session.lock();

        if !session.state.is_active() {
            debug!(state = ?session.state, "Stop ignored");
            return Outcome::RejectedInvalidState;
        }

        if let Some(mut handle) = session.teardown() {
            handle.pause();
        }
        session.state = ReplayState::Stopped;
        self.inner.state_tx.send_replace(ReplayState::Stopped);
        drop(session);

        info!("User behavior replay stopped");
        fire(&self.inner.callbacks.on_end);
        Outcome::Accepted
    }

    /// Change the speed of the active replayer
    pub fn set_speed(&self, speed: f64) -> Outcome {
        if !speed.is_finite() || speed <= 0.0 {
            warn!(speed, "Invalid replay speed");
            return Outcome::RejectedInvalidState;
        }

        let mut session = self.inner.session.lock();
        let Some(handle) = session.handle.as_mut() else {
            debug!("No active replayer; speed unchanged");
            return Outcome::RejectedInvalidState;
        };

        handle.set_config(ReplayerConfig { speed });
        session.speed = speed;
        info!("Replay speed set to {}x", speed);
        Outcome::Accepted
    }

    pub fn state(&self) -> ReplayState {
        self.inner.session.lock().state
    }

    pub fn is_replaying(&self) -> bool {
        self.state().is_active()
    }

    /// Watch replay state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ReplayState> {
        self.inner.state_tx.subscribe()
    }

    /// Speed of the current (or last) replayer
    pub fn speed(&self) -> f64 {
        self.inner.session.lock().speed
    }

    /// Sequence bound to the current (or last) session
    pub fn events(&self) -> Option<Arc<[RecordedEvent]>> {
        self.inner.session.lock().events.clone()
    }
}

impl Drop for ReplayEngine {
    fn drop(&mut self) {
        let mut session = self.inner.session.lock();
        if let Some(mut handle) = session.teardown() {
            handle.pause();
        }
    }
}
