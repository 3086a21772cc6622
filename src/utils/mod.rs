// src/utils/mod.rs
//! Shared utilities: configuration, errors, operation outcomes

pub mod config;
pub mod errors;
pub mod outcome;

pub use config::{LogFormat, LoggingConfig, MonitorConfig};
pub use errors::{MonitorError, Result};
pub use outcome::Outcome;
