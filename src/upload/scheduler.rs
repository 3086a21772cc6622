// src/upload/scheduler.rs
//! Periodic error upload
//!
//! Each tick uploads the error records the previous ticks have not delivered.
//! A failed batch stays pending and is retried on the following ticks; after
//! `max_retries` further failures it is dropped so the log cannot wedge the
//! uploader forever.

use crate::tracking::error_capture::ErrorCapture;
use crate::upload::uploader::{UploadKind, Uploader};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle to a running auto-upload task
pub struct AutoUpload {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AutoUpload {
    /// Start uploading every `period`; the first tick fires after one period
    ///
    /// Must run inside a tokio runtime.
    pub fn spawn(capture: ErrorCapture, uploader: Uploader, period: Duration, max_retries: u32) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(capture, uploader, period, max_retries, cancel.clone()));

        info!("Auto upload errors started, interval: {:?}", period);
        Self { cancel, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the timer and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for AutoUpload {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    capture: ErrorCapture,
    uploader: Uploader,
    period: Duration,
    max_retries: u32,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let pending = capture.pending_upload();
        let batch = pending.records;
        if batch.is_empty() {
            debug!("No new errors to upload");
            continue;
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = uploader.upload(UploadKind::Errors, &batch) => result,
        };

        match result {
            Ok(()) => {
                capture.mark_uploaded(pending.epoch, pending.end);
                failures = 0;
            }
            Err(_) => {
                failures += 1;
                if failures > max_retries {
                    warn!(
                        records = batch.len(),
                        attempts = failures,
                        "Giving up on error batch"
                    );
                    capture.mark_uploaded(pending.epoch, pending.end);
                    failures = 0;
                }
            }
        }
    }

    debug!("Auto upload task exited");
}
