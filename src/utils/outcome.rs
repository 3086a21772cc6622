// src/utils/outcome.rs
//! Explicit result of a refusable operation
//!
//! Invalid transitions and backpressure are normal in this crate, so they are
//! reported as values instead of errors. Callers (and tests) match on the
//! outcome rather than scraping logs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The operation took effect
    Accepted,

    /// The event matched the last buffered event and was dropped
    RejectedDuplicate,

    /// The buffer reached its limit; recording stopped
    RejectedBufferFull,

    /// The facility was not in a state that allows the operation
    RejectedInvalidState,

    /// There was nothing to act on (no events, nothing stored)
    RejectedEmpty,

    /// A collaborator failed; the failure was logged and absorbed
    Failed,
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::RejectedDuplicate => "rejected_duplicate",
            Outcome::RejectedBufferFull => "rejected_buffer_full",
            Outcome::RejectedInvalidState => "rejected_invalid_state",
            Outcome::RejectedEmpty => "rejected_empty",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
