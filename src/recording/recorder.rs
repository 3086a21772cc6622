// src/recording/recorder.rs
//! Behavior recorder
//!
//! Subscribes to a capture source and pumps every emitted event through the
//! bounded buffer. Accepted events are forwarded to the event callback;
//! consecutive duplicates are dropped; a full buffer halts the recording.

use crate::capture::event::RecordedEvent;
use crate::capture::source::{CaptureOptions, CaptureSource, Unsubscribe};
use crate::observability::{BUFFER_FULL_STOPS, EVENTS_DUPLICATE, EVENTS_RECORDED};
use crate::recording::buffer::{BufferStats, EventBuffer, DEFAULT_MAX_EVENTS};
use crate::recording::storage::{self, KeyValueStore, RECORDER_EVENTS_KEY};
use crate::utils::errors::Result;
use crate::utils::outcome::Outcome;
use metrics::counter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Callback receiving every accepted event
pub type EventCallback = Arc<dyn Fn(&RecordedEvent) + Send + Sync>;

/// Callback receiving recording status changes
pub type StatusCallback = Arc<dyn Fn(RecordingStatus) + Send + Sync>;

/// How restored events merge into the live buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Append after the current contents (repeated loads duplicate data)
    #[default]
    Append,

    /// Swap the current contents for the stored ones
    Replace,
}

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Maximum number of buffered events
    pub max_event_limit: usize,

    /// Merge policy for `load_events_from_store`
    pub load_mode: LoadMode,

    /// Options forwarded to the capture source
    pub capture: CaptureOptions,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_event_limit: DEFAULT_MAX_EVENTS,
            load_mode: LoadMode::Append,
            capture: CaptureOptions::default(),
        }
    }
}

/// Recording lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Stopped,
}

/// Status reported to the status-change observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStatus {
    Started,
    Stopped,
}

/// Optional recorder callbacks
#[derive(Clone, Default)]
pub struct RecorderCallbacks {
    pub send_event: Option<EventCallback>,
    pub on_status_change: Option<StatusCallback>,
}

struct Pump {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

struct RecordingSession {
    state: RecordingState,
    buffer: EventBuffer,
    unsubscribe: Option<Unsubscribe>,
    pump: Option<Pump>,
}

struct RecorderInner {
    config: RecorderConfig,
    session: Mutex<RecordingSession>,
    callbacks: RecorderCallbacks,
    state_tx: watch::Sender<RecordingState>,
}

impl RecorderInner {
    /// Emit handler: admit one event into the buffer
    fn record(&self, event: RecordedEvent) -> Outcome {
        let mut session = self.session.lock();

        if session.state != RecordingState::Recording {
            return Outcome::RejectedInvalidState;
        }

        let outcome = session.buffer.admit(event);

        match outcome {
            Outcome::Accepted => {
                let accepted = session.buffer.last().cloned();
                drop(session);

                counter!(EVENTS_RECORDED).increment(1);
                if let Some(event) = accepted {
                    self.forward(&event);
                }
            }
            Outcome::RejectedDuplicate => {
                drop(session);
                counter!(EVENTS_DUPLICATE).increment(1);
                debug!("Duplicate event detected, ignoring");
            }
            Outcome::RejectedBufferFull => {
                warn!(
                    limit = session.buffer.max_events(),
                    "Max event limit reached, stopping recording"
                );
                let unsubscribe = self.halt(&mut session);
                drop(session);

                if let Some(mut unsubscribe) = unsubscribe {
                    unsubscribe.release();
                }
                counter!(BUFFER_FULL_STOPS).increment(1);
                self.notify(RecordingStatus::Stopped);
            }
            _ => {}
        }

        outcome
    }

    /// Backpressure stop; the caller releases the returned handle unlocked
    fn halt(&self, session: &mut RecordingSession) -> Option<Unsubscribe> {
        session.state = RecordingState::Stopped;
        self.state_tx.send_replace(RecordingState::Stopped);

        if let Some(pump) = session.pump.take() {
            pump.shutdown.cancel();
        }
        session.unsubscribe.take()
    }

    fn forward(&self, event: &RecordedEvent) {
        match &self.callbacks.send_event {
            Some(callback) => callback(event),
            None => trace!(timestamp = event.timestamp, "Event recorded"),
        }
    }

    fn notify(&self, status: RecordingStatus) {
        if let Some(callback) = &self.callbacks.on_status_change {
            callback(status);
        }
    }
}

fn ends_pump(outcome: Outcome) -> bool {
    matches!(
        outcome,
        Outcome::RejectedBufferFull | Outcome::RejectedInvalidState
    )
}

async fn run_pump(
    inner: Arc<RecorderInner>,
    mut events: mpsc::UnboundedReceiver<RecordedEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                // keep what the source emitted before it was released
                events.close();
                while let Ok(event) = events.try_recv() {
                    if ends_pump(inner.record(event)) {
                        break;
                    }
                }
                break;
            }

            next = events.recv() => match next {
                Some(event) => {
                    if ends_pump(inner.record(event)) {
                        break;
                    }
                }
                None => {
                    debug!("Capture source closed the subscription");
                    break;
                }
            }
        }
    }

    debug!("Capture pump exited");
}

/// Behavior recorder over a capture source
pub struct EventRecorder {
    inner: Arc<RecorderInner>,
    source: Arc<dyn CaptureSource>,
    store: Arc<dyn KeyValueStore>,
}

impl EventRecorder {
    /// Create an idle recorder
    pub fn new(
        config: RecorderConfig,
        source: Arc<dyn CaptureSource>,
        store: Arc<dyn KeyValueStore>,
        callbacks: RecorderCallbacks,
    ) -> Self {
        let (state_tx, _) = watch::channel(RecordingState::Idle);
        let buffer = EventBuffer::new(config.max_event_limit);

        Self {
            inner: Arc::new(RecorderInner {
                config,
                session: Mutex::new(RecordingSession {
                    state: RecordingState::Idle,
                    buffer,
                    unsubscribe: None,
                    pump: None,
                }),
                callbacks,
                state_tx,
            }),
            source,
            store,
        }
    }

    /// Subscribe to the capture source and start buffering
    ///
    /// Returns `RejectedInvalidState` when already recording and `Failed`
    /// outside a tokio runtime, in both cases without touching the state. A
    /// failed subscription reverts the state.
    pub fn start_recording(&self) -> Result<Outcome> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("Recording requires a tokio runtime");
            return Ok(Outcome::Failed);
        };

        let previous = {
            let mut session = self.inner.session.lock();
            if session.state == RecordingState::Recording {
                debug!("Recording already in progress");
                return Ok(Outcome::RejectedInvalidState);
            }
            let previous = session.state;
            session.state = RecordingState::Recording;
            previous
        };

        self.inner.state_tx.send_replace(RecordingState::Recording);
        self.inner.notify(RecordingStatus::Started);

        let subscription = match self.source.subscribe(&self.inner.config.capture) {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("Failed to subscribe to capture source: {}", e);
                let reverted = if previous == RecordingState::Idle {
                    RecordingState::Idle
                } else {
                    RecordingState::Stopped
                };
                self.inner.session.lock().state = reverted;
                self.inner.state_tx.send_replace(reverted);
                self.inner.notify(RecordingStatus::Stopped);
                return Err(e);
            }
        };

        let (events, mut unsubscribe) = subscription.into_parts();
        let shutdown = CancellationToken::new();
        let handle = runtime.spawn(run_pump(
            Arc::clone(&self.inner),
            events,
            shutdown.clone(),
        ));

        let mut session = self.inner.session.lock();
        if session.state != RecordingState::Recording {
            // stopped while subscribing
            drop(session);
            unsubscribe.release();
            shutdown.cancel();
            return Ok(Outcome::Accepted);
        }
        session.unsubscribe = Some(unsubscribe);
        session.pump = Some(Pump { handle, shutdown });
        drop(session);

        info!("User behavior recording started");
        Ok(Outcome::Accepted)
    }

    /// Release the subscription and stop buffering
    ///
    /// Events the source emitted before the release are still buffered. Do
    /// not call this from inside the event callback.
    pub async fn stop_recording(&self) -> Outcome {
        let (unsubscribe, pump) = {
            let mut session = self.inner.session.lock();
            if session.state != RecordingState::Recording {
                return Outcome::RejectedInvalidState;
            }
            (session.unsubscribe.take(), session.pump.take())
        };

        if let Some(mut unsubscribe) = unsubscribe {
            unsubscribe.release();
        }

        if let Some(pump) = pump {
            pump.shutdown.cancel();
            if let Err(e) = pump.handle.await {
                if !e.is_cancelled() {
                    error!("Capture pump failed: {}", e);
                }
            }
        }

        let stopped_now = {
            let mut session = self.inner.session.lock();
            if session.state == RecordingState::Recording {
                session.state = RecordingState::Stopped;
                true
            } else {
                // the drain hit the limit and already halted
                false
            }
        };

        if stopped_now {
            self.inner.state_tx.send_replace(RecordingState::Stopped);
            self.inner.notify(RecordingStatus::Stopped);
            info!("User behavior recording stopped");
        }

        Outcome::Accepted
    }

    /// Feed one event through the emit handler
    pub fn record(&self, event: RecordedEvent) -> Outcome {
        self.inner.record(event)
    }

    pub fn state(&self) -> RecordingState {
        self.inner.session.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Watch recording state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<RecordingState> {
        self.inner.state_tx.subscribe()
    }

    /// Snapshot of the buffered events, in capture order
    pub fn get_events(&self) -> Vec<RecordedEvent> {
        self.inner.session.lock().buffer.to_vec()
    }

    pub fn event_count(&self) -> usize {
        self.inner.session.lock().buffer.len()
    }

    pub fn stats(&self) -> BufferStats {
        self.inner.session.lock().buffer.stats()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.inner.config
    }

    /// Empty the buffer; the recording state is untouched
    pub fn clear_events(&self) {
        self.inner.session.lock().buffer.clear();
        info!("All recorded events have been cleared");
    }

    /// Merge restored events into the buffer, bypassing dedup and the limit
    ///
    /// This is the only writer besides the capture pump; callers must not
    /// race it against an active recording.
    pub fn import_events(&self, events: Vec<RecordedEvent>, mode: LoadMode) -> usize {
        let count = events.len();
        let mut session = self.inner.session.lock();

        if session.state == RecordingState::Recording {
            warn!("Importing events while recording is active");
        }

        match mode {
            LoadMode::Append => session.buffer.extend_unchecked(events),
            LoadMode::Replace => session.buffer.replace(events),
        }

        if session.buffer.len() > session.buffer.max_events() {
            warn!(
                len = session.buffer.len(),
                limit = session.buffer.max_events(),
                "Restored buffer exceeds the event limit"
            );
        }

        count
    }

    /// Persist the buffer under the recorder key
    pub fn save_events_to_store(&self) -> Result<()> {
        let events = self.get_events();
        storage::save_events(self.store.as_ref(), RECORDER_EVENTS_KEY, &events)?;
        info!("Events saved to store ({} events)", events.len());
        Ok(())
    }

    /// Restore the buffer from the recorder key using the configured mode
    ///
    /// Returns the number of restored events (0 when nothing is stored).
    pub fn load_events_from_store(&self) -> Result<usize> {
        match storage::load_events(self.store.as_ref(), RECORDER_EVENTS_KEY)? {
            Some(events) => {
                let count = self.import_events(events, self.inner.config.load_mode);
                info!("Events loaded from store ({} events)", count);
                Ok(count)
            }
            None => {
                debug!("No stored events under {}", RECORDER_EVENTS_KEY);
                Ok(0)
            }
        }
    }
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        let mut session = self.inner.session.lock();
        if let Some(pump) = session.pump.take() {
            pump.shutdown.cancel();
        }
        let unsubscribe = session.unsubscribe.take();
        drop(session);

        if let Some(mut unsubscribe) = unsubscribe {
            unsubscribe.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::event::EventType;
    use crate::capture::source::{ChannelCapture, UnavailableCapture};
    use crate::recording::storage::MemoryStore;
    use serde_json::json;

    struct Harness {
        recorder: EventRecorder,
        capture: ChannelCapture,
        store: Arc<MemoryStore>,
        statuses: Arc<Mutex<Vec<RecordingStatus>>>,
        forwarded: Arc<Mutex<Vec<RecordedEvent>>>,
    }

    fn harness(max_event_limit: usize) -> Harness {
        let capture = ChannelCapture::new();
        let store = Arc::new(MemoryStore::new());
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let forwarded = Arc::new(Mutex::new(Vec::new()));

        let callbacks = RecorderCallbacks {
            send_event: Some({
                let forwarded = Arc::clone(&forwarded);
                Arc::new(move |event: &RecordedEvent| forwarded.lock().push(event.clone()))
            }),
            on_status_change: Some({
                let statuses = Arc::clone(&statuses);
                Arc::new(move |status| statuses.lock().push(status))
            }),
        };

        let config = RecorderConfig {
            max_event_limit,
            ..Default::default()
        };

        let recorder = EventRecorder::new(
            config,
            Arc::new(capture.clone()),
            store.clone(),
            callbacks,
        );

        Harness {
            recorder,
            capture,
            store,
            statuses,
            forwarded,
        }
    }

    fn event(tag: &str) -> RecordedEvent {
        RecordedEvent::new(EventType::IncrementalSnapshot, 100, json!({ "tag": tag }))
    }

    #[tokio::test]
    async fn test_record_requires_recording() {
        let h = harness(10);
        assert_eq!(h.recorder.record(event("a")), Outcome::RejectedInvalidState);
        assert_eq!(h.recorder.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let h = harness(10);

        assert_eq!(h.recorder.start_recording().unwrap(), Outcome::Accepted);
        assert_eq!(
            h.recorder.start_recording().unwrap(),
            Outcome::RejectedInvalidState
        );

        assert_eq!(*h.statuses.lock(), vec![RecordingStatus::Started]);
        assert!(h.capture.is_subscribed());
    }

    #[tokio::test]
    async fn test_buffer_full_stops_recording() {
        let h = harness(3);
        let mut state = h.recorder.subscribe_state();
        h.recorder.start_recording().unwrap();

        for tag in ["a", "a", "b", "c", "d"] {
            assert!(h.capture.emit(event(tag)));
        }

        state
            .wait_for(|s| *s == RecordingState::Stopped)
            .await
            .unwrap();

        assert_eq!(
            h.recorder.get_events(),
            vec![event("a"), event("b"), event("c")]
        );
        assert_eq!(h.forwarded.lock().len(), 3);
        assert_eq!(
            *h.statuses.lock(),
            vec![RecordingStatus::Started, RecordingStatus::Stopped]
        );
        assert!(!h.capture.is_subscribed());

        let stats = h.recorder.stats();
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.rejected_full, 1);
    }

    #[tokio::test]
    async fn test_direct_record_outcomes() {
        let h = harness(2);
        h.recorder.start_recording().unwrap();

        assert_eq!(h.recorder.record(event("a")), Outcome::Accepted);
        assert_eq!(h.recorder.record(event("a")), Outcome::RejectedDuplicate);
        assert_eq!(h.recorder.record(event("b")), Outcome::Accepted);
        assert_eq!(h.recorder.record(event("c")), Outcome::RejectedBufferFull);
        assert_eq!(h.recorder.record(event("d")), Outcome::RejectedInvalidState);

        assert_eq!(h.recorder.state(), RecordingState::Stopped);
        assert_eq!(h.recorder.event_count(), 2);
    }

    #[tokio::test]
    async fn test_stop_drains_emitted_events() {
        let h = harness(100);
        h.recorder.start_recording().unwrap();

        h.capture.emit(event("a"));
        h.capture.emit(event("b"));
        h.capture.emit(event("c"));

        assert_eq!(h.recorder.stop_recording().await, Outcome::Accepted);

        assert_eq!(
            h.recorder.get_events(),
            vec![event("a"), event("b"), event("c")]
        );
        assert_eq!(h.recorder.state(), RecordingState::Stopped);
        assert!(!h.capture.emit(event("late")));
        assert_eq!(
            *h.statuses.lock(),
            vec![RecordingStatus::Started, RecordingStatus::Stopped]
        );
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let h = harness(10);
        assert_eq!(
            h.recorder.stop_recording().await,
            Outcome::RejectedInvalidState
        );
        assert!(h.statuses.lock().is_empty());
    }

    #[tokio::test]
    async fn test_restart_keeps_buffer() {
        let h = harness(10);

        h.recorder.start_recording().unwrap();
        h.capture.emit(event("a"));
        h.recorder.stop_recording().await;

        h.recorder.start_recording().unwrap();
        h.capture.emit(event("b"));
        h.recorder.stop_recording().await;

        assert_eq!(h.recorder.get_events(), vec![event("a"), event("b")]);
    }

    #[tokio::test]
    async fn test_failed_subscribe_reverts_state() {
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let callbacks = RecorderCallbacks {
            send_event: None,
            on_status_change: Some({
                let statuses = Arc::clone(&statuses);
                Arc::new(move |status| statuses.lock().push(status))
            }),
        };
        let recorder = EventRecorder::new(
            RecorderConfig::default(),
            Arc::new(UnavailableCapture),
            Arc::new(MemoryStore::new()),
            callbacks,
        );

        assert!(recorder.start_recording().is_err());
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert_eq!(
            *statuses.lock(),
            vec![RecordingStatus::Started, RecordingStatus::Stopped]
        );
    }

    #[tokio::test]
    async fn test_save_then_load_in_fresh_recorder() {
        let h = harness(10);
        h.recorder.start_recording().unwrap();
        for tag in ["a", "b", "c"] {
            h.recorder.record(event(tag));
        }
        h.recorder.save_events_to_store().unwrap();

        let fresh = EventRecorder::new(
            RecorderConfig::default(),
            Arc::new(ChannelCapture::new()),
            h.store.clone(),
            RecorderCallbacks::default(),
        );
        assert_eq!(fresh.load_events_from_store().unwrap(), 3);
        assert_eq!(fresh.get_events(), vec![event("a"), event("b"), event("c")]);

        // append mode duplicates on a second load
        fresh.load_events_from_store().unwrap();
        assert_eq!(fresh.event_count(), 6);
    }

    #[tokio::test]
    async fn test_replace_mode_load() {
        let store = Arc::new(MemoryStore::new());
        storage::save_events(store.as_ref(), RECORDER_EVENTS_KEY, &[event("x")]).unwrap();

        let recorder = EventRecorder::new(
            RecorderConfig {
                load_mode: LoadMode::Replace,
                ..Default::default()
            },
            Arc::new(ChannelCapture::new()),
            store,
            RecorderCallbacks::default(),
        );

        recorder.load_events_from_store().unwrap();
        recorder.load_events_from_store().unwrap();
        assert_eq!(recorder.get_events(), vec![event("x")]);
    }

    #[tokio::test]
    async fn test_load_with_nothing_stored() {
        let h = harness(10);
        assert_eq!(h.recorder.load_events_from_store().unwrap(), 0);
        assert_eq!(h.recorder.event_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_keeps_recording() {
        let h = harness(10);
        h.recorder.start_recording().unwrap();
        h.recorder.record(event("a"));

        h.recorder.clear_events();

        assert_eq!(h.recorder.event_count(), 0);
        assert!(h.recorder.is_recording());
        // cleared buffer has no predecessor, so the same event is accepted again
        assert_eq!(h.recorder.record(event("a")), Outcome::Accepted);
    }

    #[test]
    fn test_start_without_runtime_fails_cleanly() {
        let h = harness(10);

        assert_eq!(h.recorder.start_recording().unwrap(), Outcome::Failed);
        assert_eq!(h.recorder.state(), RecordingState::Idle);
        assert!(!h.recorder.is_recording());
        assert!(!h.capture.is_subscribed());
        assert!(h.statuses.lock().is_empty());
    }

    proptest::proptest! {
        #[test]
        fn distinct_events_through_pump_kept_in_order(limit in 1usize..48, count in 0usize..48) {
            let count = count.min(limit);
            let events: Vec<_> = (0..count).map(|n| event(&n.to_string())).collect();

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let (buffered, forwarded) = runtime.block_on(async {
                let h = harness(limit);
                h.recorder.start_recording().unwrap();
                for event in events.iter().cloned() {
                    assert!(h.capture.emit(event));
                }
                h.recorder.stop_recording().await;
                let forwarded = h.forwarded.lock().clone();
                (h.recorder.get_events(), forwarded)
            });

            proptest::prop_assert_eq!(&buffered, &events);
            proptest::prop_assert_eq!(&forwarded, &events);
        }
    }
}
