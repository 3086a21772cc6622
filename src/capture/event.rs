// src/capture/event.rs
//! Recorded DOM event model
//!
//! Events are opaque to the monitor apart from their discriminator and
//! timestamp. The payload stays whatever JSON the capture engine produced.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Capture event discriminator, serialized as its numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EventType {
    DomContentLoaded,
    Load,
    FullSnapshot,
    IncrementalSnapshot,
    Meta,
    Custom,
    Plugin,
}

impl From<EventType> for u8 {
    fn from(event_type: EventType) -> u8 {
        match event_type {
            EventType::DomContentLoaded => 0,
            EventType::Load => 1,
            EventType::FullSnapshot => 2,
            EventType::IncrementalSnapshot => 3,
            EventType::Meta => 4,
            EventType::Custom => 5,
            EventType::Plugin => 6,
        }
    }
}

impl TryFrom<u8> for EventType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(EventType::DomContentLoaded),
            1 => Ok(EventType::Load),
            2 => Ok(EventType::FullSnapshot),
            3 => Ok(EventType::IncrementalSnapshot),
            4 => Ok(EventType::Meta),
            5 => Ok(EventType::Custom),
            6 => Ok(EventType::Plugin),
            other => Err(format!("unknown event type code {}", other)),
        }
    }
}

/// One timestamped capture record
///
/// Equality is deep structural equality over every field, which is what the
/// recorder uses to collapse consecutive duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Capture-engine payload
    pub data: serde_json::Value,

    /// Milliseconds since the Unix epoch
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,
}

impl RecordedEvent {
    pub fn new(event_type: EventType, timestamp: i64, data: serde_json::Value) -> Self {
        Self {
            event_type,
            data,
            timestamp,
            delay: None,
        }
    }

    pub fn is_full_snapshot(&self) -> bool {
        self.event_type == EventType::FullSnapshot
    }
}
