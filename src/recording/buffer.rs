// src/recording/buffer.rs
//! Bounded, order-preserving event buffer
//!
//! Admission checks the limit first, then collapses an event equal to the
//! last buffered one. A full buffer never evicts: the caller is expected to
//! stop capturing.

use crate::capture::event::RecordedEvent;
use crate::utils::outcome::Outcome;

/// Default maximum number of buffered events
pub const DEFAULT_MAX_EVENTS: usize = 1000;

/// Event buffer with consecutive-duplicate suppression
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: Vec<RecordedEvent>,
    max_events: usize,
    stats: BufferStats,
}

impl EventBuffer {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events,
            stats: BufferStats::default(),
        }
    }

    /// Try to append an event
    ///
    /// Returns `Accepted`, `RejectedDuplicate` or `RejectedBufferFull`.
    pub fn admit(&mut self, event: RecordedEvent) -> Outcome {
        if self.events.len() >= self.max_events {
            self.stats.rejected_full += 1;
            return Outcome::RejectedBufferFull;
        }

        if self.events.last() == Some(&event) {
            self.stats.duplicates += 1;
            return Outcome::RejectedDuplicate;
        }

        self.events.push(event);
        self.stats.accepted += 1;
        Outcome::Accepted
    }

    /// Append without dedup or limit checks (restore path)
    pub fn extend_unchecked(&mut self, events: Vec<RecordedEvent>) {
        self.stats.imported += events.len() as u64;
        self.events.extend(events);
    }

    /// Swap the contents for the given events
    pub fn replace(&mut self, events: Vec<RecordedEvent>) {
        self.stats.imported += events.len() as u64;
        self.events = events;
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn last(&self) -> Option<&RecordedEvent> {
        self.events.last()
    }

    pub fn as_slice(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn to_vec(&self) -> Vec<RecordedEvent> {
        self.events.clone()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.max_events
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn stats(&self) -> BufferStats {
        self.stats.clone()
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

/// Buffer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Events appended through admission
    pub accepted: u64,

    /// Events dropped as consecutive duplicates
    pub duplicates: u64,

    /// Events refused because the buffer was full
    pub rejected_full: u64,

    /// Events restored from storage
    pub imported: u64,
}

impl BufferStats {
    /// Share of offered events dropped as duplicates
    pub fn duplicate_rate(&self) -> f64 {
        let offered = self.accepted + self.duplicates + self.rejected_full;
        if offered == 0 {
            0.0
        } else {
            (self.duplicates as f64 / offered as f64) * 100.0
        }
    }
}
