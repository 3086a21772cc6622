// src/upload/mod.rs
//! Network delivery of captured data
//!
//! - **Transport**: POSTs a JSON body, reports the status code
//! - **Uploader**: wraps records into the `{ type, data, timestamp }` payload
//! - **Scheduler**: periodic error upload with a delivery cursor

pub mod scheduler;
pub mod transport;
pub mod uploader;

pub use scheduler::AutoUpload;
pub use transport::{HttpTransport, Transport};
pub use uploader::{UploadKind, UploadPayload, Uploader};
