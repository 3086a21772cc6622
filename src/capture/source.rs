// src/capture/source.rs
//! Capture capability boundary
//!
//! A capture source hands out subscriptions: a channel of events plus an
//! explicit release handle. The recorder owns both for the lifetime of a
//! recording session.

use crate::capture::event::RecordedEvent;
use crate::utils::errors::{MonitorError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Options forwarded to the capture engine on subscribe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Take a fresh full snapshot every N events
    pub checkout_every_nth: Option<u32>,

    /// Take a fresh full snapshot every N milliseconds
    pub checkout_every_ms: Option<u64>,

    /// Mask the value of every input element
    pub mask_all_inputs: bool,

    /// Elements carrying this class are not recorded
    pub block_class: Option<String>,
}

/// Capture engine interface
pub trait CaptureSource: Send + Sync {
    /// Start delivering events to a new subscription
    fn subscribe(&self, options: &CaptureOptions) -> Result<Subscription>;
}

/// Releases the listeners behind a subscription
///
/// Releasing is idempotent. Dropping an unreleased handle releases it.
pub struct Unsubscribe {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Unsubscribe {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("released", &self.is_released())
            .finish()
    }
}

/// A live capture subscription
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<RecordedEvent>,
    unsubscribe: Unsubscribe,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<RecordedEvent>, unsubscribe: Unsubscribe) -> Self {
        Self { events, unsubscribe }
    }

    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<RecordedEvent>, Unsubscribe) {
        (self.events, self.unsubscribe)
    }
}

/// In-process capture source fed by the host
///
/// Host bindings call [`ChannelCapture::emit`] for every serialized record the
/// DOM capture engine produces. Only the latest subscription receives events.
#[derive(Clone, Default)]
pub struct ChannelCapture {
    inner: Arc<Mutex<ChannelState>>,
}

#[derive(Default)]
struct ChannelState {
    generation: u64,
    sender: Option<mpsc::UnboundedSender<RecordedEvent>>,
}

impl ChannelCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event; returns false when nobody is subscribed
    pub fn emit(&self, event: RecordedEvent) -> bool {
        let state = self.inner.lock();
        match state.sender.as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().sender.is_some()
    }
}

impl CaptureSource for ChannelCapture {
    fn subscribe(&self, options: &CaptureOptions) -> Result<Subscription> {
        debug!(?options, "Opening channel capture subscription");

        let (tx, rx) = mpsc::unbounded_channel();

        let generation = {
            let mut state = self.inner.lock();
            state.generation += 1;
            state.sender = Some(tx);
            state.generation
        };

        let inner = Arc::clone(&self.inner);
        let unsubscribe = Unsubscribe::new(move || {
            let mut state = inner.lock();
            if state.generation == generation {
                state.sender = None;
                debug!("Channel capture subscription released");
            }
        });

        Ok(Subscription::new(rx, unsubscribe))
    }
}

/// Capture source that always refuses to subscribe
///
/// Stands in when the host has no capture engine available.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCapture;

impl CaptureSource for UnavailableCapture {
    fn subscribe(&self, _options: &CaptureOptions) -> Result<Subscription> {
        Err(MonitorError::CaptureFailed(
            "No capture engine available".to_string(),
        ))
    }
}
