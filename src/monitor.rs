// src/monitor.rs
//! Frontend monitor
//!
//! Owns one error capture, one behavior recorder and one replay engine, wires
//! their callbacks to the uploader, and runs the optional auto-upload timer.
//! Every public operation reports refusals through [`Outcome`]; none of them
//! returns an error.

use crate::capture::event::RecordedEvent;
use crate::capture::source::CaptureSource;
use crate::recording::recorder::{
    EventCallback, EventRecorder, RecorderCallbacks, StatusCallback,
};
use crate::recording::storage::{self, KeyValueStore, SESSION_EVENTS_KEY};
use crate::replay::backend::{ReplayBackend, ReplayContainer};
use crate::replay::engine::{ReplayCallbacks, ReplayEngine, ReplayState};
use crate::tracking::error_capture::{ErrorCallback, ErrorCapture};
use crate::tracking::hooks::ErrorHooks;
use crate::tracking::record::ErrorRecord;
use crate::upload::scheduler::AutoUpload;
use crate::upload::transport::Transport;
use crate::upload::uploader::{UploadKind, Uploader};
use crate::utils::config::MonitorConfig;
use crate::utils::outcome::Outcome;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// User callbacks
#[derive(Clone, Default)]
pub struct MonitorCallbacks {
    /// Receives every captured error; replaces real-time error upload
    pub send_error: Option<ErrorCallback>,

    /// Receives every recorded event; replaces real-time event upload
    pub send_event: Option<EventCallback>,

    pub on_status_change: Option<StatusCallback>,

    pub replay: ReplayCallbacks,
}

/// Host capabilities the monitor is built on
#[derive(Clone)]
pub struct Collaborators {
    pub capture: Arc<dyn CaptureSource>,
    pub replay: Arc<dyn ReplayBackend>,
    pub hooks: Arc<dyn ErrorHooks>,
    pub store: Arc<dyn KeyValueStore>,
    pub transport: Arc<dyn Transport>,
}

/// Session capture, replay and upload orchestrator
pub struct FrontendMonitor {
    config: MonitorConfig,
    error_capture: Option<ErrorCapture>,
    recorder: Option<EventRecorder>,
    replay: ReplayEngine,
    store: Arc<dyn KeyValueStore>,
    uploader: Uploader,
    auto_upload: Mutex<Option<AutoUpload>>,
    destroyed: AtomicBool,
}

impl FrontendMonitor {
    /// Wire the enabled components
    ///
    /// Auto-upload only starts when this runs inside a tokio runtime.
    pub fn new(config: MonitorConfig, callbacks: MonitorCallbacks, collaborators: Collaborators) -> Self {
        let uploader = Uploader::new(config.upload_endpoint.clone(), collaborators.transport);
        let realtime = config.realtime_upload && uploader.has_endpoint();

        let error_capture = config.error_tracker.then(|| {
            let send_error = callbacks.send_error.clone().or_else(|| {
                realtime.then(|| {
                    let uploader = uploader.clone();
                    Arc::new(move |record: &ErrorRecord| {
                        debug!(kind = record.kind().as_str(), "Uploading error to server");
                        uploader.spawn_upload(UploadKind::Errors, vec![record.clone()]);
                    }) as ErrorCallback
                })
            });
            ErrorCapture::install(collaborators.hooks.as_ref(), send_error)
        });

        let recorder = config.behavior_tracker.then(|| {
            let send_event = callbacks.send_event.clone().or_else(|| {
                realtime.then(|| {
                    let uploader = uploader.clone();
                    Arc::new(move |event: &RecordedEvent| {
                        uploader.spawn_upload(UploadKind::Events, vec![event.clone()]);
                    }) as EventCallback
                })
            });
            EventRecorder::new(
                config.recorder.clone(),
                collaborators.capture,
                Arc::clone(&collaborators.store),
                RecorderCallbacks {
                    send_event,
                    on_status_change: callbacks.on_status_change.clone(),
                },
            )
        });

        let replay = ReplayEngine::new(collaborators.replay, config.replay.clone(), callbacks.replay);

        let monitor = Self {
            config,
            error_capture,
            recorder,
            replay,
            store: collaborators.store,
            uploader,
            auto_upload: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        };

        if monitor.config.auto_upload_interval().is_some() {
            monitor.start_auto_upload_errors();
        }

        monitor
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    // ===== Recording =====

    pub fn start_recording(&self) -> Outcome {
        if self.is_destroyed() {
            warn!("Monitor has been destroyed");
            return Outcome::RejectedInvalidState;
        }

        let Some(recorder) = &self.recorder else {
            warn!("Behavior tracking is disabled");
            return Outcome::RejectedInvalidState;
        };

        match recorder.start_recording() {
            Ok(Outcome::RejectedInvalidState) => {
                warn!("Recording is already in progress");
                Outcome::RejectedInvalidState
            }
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to start recording: {}", e);
                Outcome::Failed
            }
        }
    }

    pub async fn stop_recording(&self) -> Outcome {
        let outcome = match &self.recorder {
            Some(recorder) => recorder.stop_recording().await,
            None => Outcome::RejectedInvalidState,
        };

        if outcome == Outcome::RejectedInvalidState {
            warn!("No recording in progress");
        }
        outcome
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(EventRecorder::is_recording)
    }

    /// Snapshot of the recorder buffer; empty when behavior tracking is off
    pub fn get_events(&self) -> Vec<RecordedEvent> {
        self.recorder
            .as_ref()
            .map(EventRecorder::get_events)
            .unwrap_or_default()
    }

    // ===== Replay =====

    /// Replay the current recorder buffer into `container`
    pub fn start_replay(&self, container: Arc<dyn ReplayContainer>) -> Outcome {
        if self.is_destroyed() {
            warn!("Monitor has been destroyed");
            return Outcome::RejectedInvalidState;
        }

        if self.replay.is_replaying() {
            warn!("Replay is already in progress");
            return Outcome::RejectedInvalidState;
        }

        match self.replay.start_replay(container, self.get_events()) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to start replay: {}", e);
                Outcome::Failed
            }
        }
    }

    pub fn pause_replay(&self) -> Outcome {
        self.replay.pause_replay()
    }

    pub fn resume_replay(&self) -> Outcome {
        self.replay.resume_replay()
    }

    pub fn stop_replay(&self) -> Outcome {
        let outcome = self.replay.stop_replay();
        if outcome == Outcome::RejectedInvalidState {
            warn!("No replay in progress");
        }
        outcome
    }

    pub fn set_replay_speed(&self, speed: f64) -> Outcome {
        self.replay.set_speed(speed)
    }

    pub fn is_replaying(&self) -> bool {
        self.replay.is_replaying()
    }

    pub fn replay_state(&self) -> ReplayState {
        self.replay.state()
    }

    // ===== Errors =====

    pub fn get_errors(&self) -> Vec<ErrorRecord> {
        self.error_capture
            .as_ref()
            .map(ErrorCapture::get_errors)
            .unwrap_or_default()
    }

    pub fn clear_errors(&self) -> Outcome {
        match &self.error_capture {
            Some(capture) => {
                capture.clear_errors();
                Outcome::Accepted
            }
            None => Outcome::RejectedInvalidState,
        }
    }

    /// Start the periodic error upload using `auto_upload_interval_ms`
    pub fn start_auto_upload_errors(&self) -> Outcome {
        if self.is_destroyed() {
            return Outcome::RejectedInvalidState;
        }

        let Some(capture) = &self.error_capture else {
            warn!("Error tracking is disabled; auto upload not started");
            return Outcome::RejectedInvalidState;
        };

        let Some(period) = self
            .config
            .auto_upload_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
        else {
            warn!("Auto upload interval not configured");
            return Outcome::RejectedInvalidState;
        };

        let mut slot = self.auto_upload.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("Auto upload already running");
            return Outcome::RejectedInvalidState;
        }

        if tokio::runtime::Handle::try_current().is_err() {
            error!("Auto upload requires a tokio runtime");
            return Outcome::Failed;
        }

        *slot = Some(AutoUpload::spawn(
            capture.clone(),
            self.uploader.clone(),
            period,
            self.config.max_upload_retries,
        ));
        Outcome::Accepted
    }

    /// Cancel the periodic error upload
    pub fn stop_auto_upload_errors(&self) -> Outcome {
        match self.auto_upload.lock().take() {
            Some(task) => {
                drop(task);
                info!("Auto error upload stopped");
                Outcome::Accepted
            }
            None => Outcome::RejectedInvalidState,
        }
    }

    pub fn is_auto_uploading(&self) -> bool {
        self.auto_upload
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    // ===== Persistence =====

    /// Save the recorder buffer under the session key
    pub fn save_events(&self) -> Outcome {
        if self.recorder.is_none() {
            return Outcome::RejectedInvalidState;
        }

        let events = self.get_events();
        if events.is_empty() {
            debug!("No events to save");
            return Outcome::RejectedEmpty;
        }

        match storage::save_events(self.store.as_ref(), SESSION_EVENTS_KEY, &events) {
            Ok(()) => {
                info!("User behavior events saved ({} events)", events.len());
                Outcome::Accepted
            }
            Err(e) => {
                error!("Failed to save events: {}", e);
                Outcome::Failed
            }
        }
    }

    /// Merge the saved session into the recorder buffer
    pub fn load_events(&self) -> Outcome {
        let Some(recorder) = &self.recorder else {
            return Outcome::RejectedInvalidState;
        };

        match storage::load_events(self.store.as_ref(), SESSION_EVENTS_KEY) {
            Ok(Some(events)) => {
                let count = recorder.import_events(events, self.config.session_load_mode);
                info!("User behavior events loaded ({} events)", count);
                Outcome::Accepted
            }
            Ok(None) => {
                warn!("No saved events found");
                Outcome::RejectedEmpty
            }
            Err(e) => {
                error!("Failed to load events: {}", e);
                Outcome::Failed
            }
        }
    }

    /// Empty the buffer and forget the saved session
    pub fn clear_events(&self) -> Outcome {
        let Some(recorder) = &self.recorder else {
            return Outcome::RejectedInvalidState;
        };

        recorder.clear_events();

        match self.store.remove(SESSION_EVENTS_KEY) {
            Ok(()) => {
                info!("User behavior events cleared");
                Outcome::Accepted
            }
            Err(e) => {
                error!("Failed to remove saved events: {}", e);
                Outcome::Failed
            }
        }
    }

    // ===== Accessors =====

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn recorder(&self) -> Option<&EventRecorder> {
        self.recorder.as_ref()
    }

    pub fn error_capture(&self) -> Option<&ErrorCapture> {
        self.error_capture.as_ref()
    }

    pub fn replay_engine(&self) -> &ReplayEngine {
        &self.replay
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    /// Stop recording, replay and auto-upload
    ///
    /// Safe to call more than once; later `start_*` calls are refused.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            debug!("Monitor already destroyed");
        }

        if let Some(recorder) = &self.recorder {
            recorder.stop_recording().await;
        }
        self.replay.stop_replay();

        let task = self.auto_upload.lock().take();
        if let Some(task) = task {
            task.shutdown().await;
            info!("Auto error upload stopped");
        }

        info!("FrontendMonitor instance destroyed");
    }
}
