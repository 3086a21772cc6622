// src/tracking/error_capture.rs
//! Global error capture
//!
//! Installs one handler per hook kind, normalizes native signals into
//! [`ErrorRecord`]s, keeps them in an append-only log and forwards each one to
//! the error callback. Handlers never let a panic escape into the host.

use crate::observability::ERRORS_CAPTURED;
use crate::tracking::hooks::{ElementKind, ErrorHooks, HookKind, NativeSignal, SignalHandler};
use crate::tracking::record::ErrorRecord;
use metrics::counter;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Callback receiving every captured error
pub type ErrorCallback = Arc<dyn Fn(&ErrorRecord) + Send + Sync>;

#[derive(Default)]
struct ErrorLog {
    records: Vec<ErrorRecord>,
    /// Records before this index were delivered by the auto-uploader
    uploaded: usize,
    /// Bumped by every clear; a cursor taken under an older epoch is stale
    epoch: u64,
}

/// Undelivered records plus the cursor that commits them
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub epoch: u64,
    pub end: usize,
    pub records: Vec<ErrorRecord>,
}

struct CaptureInner {
    log: Mutex<ErrorLog>,
    send_error: Option<ErrorCallback>,
}

impl CaptureInner {
    fn handle(&self, record: ErrorRecord) {
        error!(kind = record.kind().as_str(), ?record, "Captured error");
        counter!(ERRORS_CAPTURED, "kind" => record.kind().as_str()).increment(1);

        self.log.lock().records.push(record.clone());

        match &self.send_error {
            Some(callback) => callback(&record),
            None => debug!("No error callback configured"),
        }
    }
}

/// Turn a native signal into a record; window-level load events yield `None`
pub fn normalize(signal: NativeSignal) -> Option<ErrorRecord> {
    match signal {
        NativeSignal::Error {
            message,
            source,
            lineno,
            colno,
            stack,
        } => Some(ErrorRecord::JsError {
            message,
            source,
            lineno,
            colno,
            stack,
        }),
        NativeSignal::Rejection { reason } => Some(ErrorRecord::UnhandledRejection { reason }),
        NativeSignal::ResourceLoad { target } => {
            let target = target?;
            let source = match target.element {
                ElementKind::Image | ElementKind::Script => target.src.unwrap_or_default(),
                ElementKind::Link => target.href.unwrap_or_default(),
                ElementKind::Other(_) => target.outer_html.clone(),
            };
            Some(ErrorRecord::ResourceError {
                target: target.outer_html,
                source,
            })
        }
    }
}

/// Error capture pipeline
#[derive(Clone)]
pub struct ErrorCapture {
    inner: Arc<CaptureInner>,
}

impl ErrorCapture {
    /// Install the three global handlers on `hooks`
    ///
    /// A hook that fails to install is logged and skipped.
    pub fn install(hooks: &dyn ErrorHooks, send_error: Option<ErrorCallback>) -> Self {
        let capture = Self {
            inner: Arc::new(CaptureInner {
                log: Mutex::new(ErrorLog::default()),
                send_error,
            }),
        };

        for kind in HookKind::ALL {
            if let Err(e) = hooks.install(kind, capture.handler()) {
                warn!(?kind, "Failed to install error hook: {}", e);
            }
        }

        capture
    }

    fn handler(&self) -> SignalHandler {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |signal: NativeSignal| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                if let Some(record) = normalize(signal) {
                    inner.handle(record);
                }
            }));
            if result.is_err() {
                warn!("Error handler panicked; continuing");
            }
        })
    }

    /// Report an already-normalized error through the capture path
    pub fn capture(&self, record: ErrorRecord) {
        let inner = Arc::clone(&self.inner);
        if panic::catch_unwind(AssertUnwindSafe(move || inner.handle(record))).is_err() {
            warn!("Error handler panicked; continuing");
        }
    }

    /// Snapshot of every captured error, in capture order
    pub fn get_errors(&self) -> Vec<ErrorRecord> {
        self.inner.log.lock().records.clone()
    }

    pub fn error_count(&self) -> usize {
        self.inner.log.lock().records.len()
    }

    /// Empty the log; handlers stay installed
    pub fn clear_errors(&self) {
        let mut log = self.inner.log.lock();
        log.records.clear();
        log.uploaded = 0;
        log.epoch += 1;
        info!("Error logs cleared");
    }

    /// Records not yet delivered, with the cursor to commit once they are
    pub fn pending_upload(&self) -> PendingUpload {
        let log = self.inner.log.lock();
        let start = log.uploaded.min(log.records.len());
        PendingUpload {
            epoch: log.epoch,
            end: log.records.len(),
            records: log.records[start..].to_vec(),
        }
    }

    /// Commit delivery of everything before `end`
    ///
    /// Ignored when the log was cleared after `epoch` was read.
    pub fn mark_uploaded(&self, epoch: u64, end: usize) {
        let mut log = self.inner.log.lock();
        if log.epoch != epoch {
            debug!("Log cleared during upload; keeping cursor");
            return;
        }
        log.uploaded = end.min(log.records.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::hooks::{HookRegistry, ResourceTarget};
    use crate::utils::errors::{MonitorError, Result};
    use serde_json::json;

    fn js_error(message: &str) -> NativeSignal {
        NativeSignal::Error {
            message: message.to_string(),
            source: "app.js".to_string(),
            lineno: 1,
            colno: 2,
            stack: Some("at main (app.js:1:2)".to_string()),
        }
    }

    fn image_failure() -> NativeSignal {
        NativeSignal::ResourceLoad {
            target: Some(ResourceTarget {
                element: ElementKind::Image,
                src: Some("https://cdn.example.com/logo.png".to_string()),
                href: None,
                outer_html: r#"<img src="https://cdn.example.com/logo.png">"#.to_string(),
            }),
        }
    }

    #[test]
    fn test_installs_each_hook_once() {
        let hooks = HookRegistry::new();
        let _capture = ErrorCapture::install(&hooks, None);

        for kind in HookKind::ALL {
            assert_eq!(hooks.handler_count(kind), 1);
        }
    }

    #[test]
    fn test_signals_logged_and_forwarded_in_order() {
        let hooks = HookRegistry::new();
        let forwarded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&forwarded);
        let capture = ErrorCapture::install(
            &hooks,
            Some(Arc::new(move |record: &ErrorRecord| sink.lock().push(record.clone()))),
        );

        hooks.dispatch(js_error("first"));
        hooks.dispatch(NativeSignal::Rejection {
            reason: json!("network down"),
        });
        hooks.dispatch(image_failure());

        let errors = capture.get_errors();
        assert_eq!(errors.len(), 3);
        assert!(matches!(&errors[0], ErrorRecord::JsError { message, .. } if message == "first"));
        assert_eq!(
            errors[1],
            ErrorRecord::UnhandledRejection {
                reason: json!("network down")
            }
        );
        assert_eq!(
            errors[2],
            ErrorRecord::ResourceError {
                target: r#"<img src="https://cdn.example.com/logo.png">"#.to_string(),
                source: "https://cdn.example.com/logo.png".to_string(),
            }
        );
        assert_eq!(*forwarded.lock(), errors);
    }

    #[test]
    fn test_window_load_error_ignored() {
        let hooks = HookRegistry::new();
        let capture = ErrorCapture::install(&hooks, None);

        hooks.dispatch(NativeSignal::ResourceLoad { target: None });
        assert_eq!(capture.error_count(), 0);
    }

    #[test]
    fn test_resource_source_by_element() {
        let link = normalize(NativeSignal::ResourceLoad {
            target: Some(ResourceTarget {
                element: ElementKind::Link,
                src: None,
                href: Some("/theme.css".to_string()),
                outer_html: r#"<link href="/theme.css">"#.to_string(),
            }),
        });
        assert!(matches!(link, Some(ErrorRecord::ResourceError { source, .. }) if source == "/theme.css"));

        let video = normalize(NativeSignal::ResourceLoad {
            target: Some(ResourceTarget {
                element: ElementKind::Other("video".to_string()),
                src: Some("clip.mp4".to_string()),
                href: None,
                outer_html: r#"<video src="clip.mp4"></video>"#.to_string(),
            }),
        });
        assert!(matches!(
            video,
            Some(ErrorRecord::ResourceError { source, .. }) if source == r#"<video src="clip.mp4"></video>"#
        ));
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let hooks = HookRegistry::new();
        let capture = ErrorCapture::install(
            &hooks,
            Some(Arc::new(|_: &ErrorRecord| panic!("callback bug"))),
        );

        hooks.dispatch(js_error("boom"));
        hooks.dispatch(js_error("again"));

        // records are stored before the callback runs
        assert_eq!(capture.error_count(), 2);
    }

    #[test]
    fn test_failed_hook_install_is_skipped() {
        struct Flaky {
            inner: HookRegistry,
        }

        impl ErrorHooks for Flaky {
            fn install(&self, kind: HookKind, handler: SignalHandler) -> Result<()> {
                if kind == HookKind::ResourceLoad {
                    return Err(MonitorError::HookFailed("no capture phase".into()));
                }
                self.inner.install(kind, handler)
            }
        }

        let hooks = Flaky {
            inner: HookRegistry::new(),
        };
        let capture = ErrorCapture::install(&hooks, None);

        hooks.inner.dispatch(js_error("still captured"));
        assert_eq!(capture.error_count(), 1);
        assert_eq!(hooks.inner.handler_count(HookKind::ResourceLoad), 0);
    }

    #[test]
    fn test_clear_keeps_hooks() {
        let hooks = HookRegistry::new();
        let capture = ErrorCapture::install(&hooks, None);

        hooks.dispatch(js_error("a"));
        capture.clear_errors();
        assert_eq!(capture.error_count(), 0);

        hooks.dispatch(js_error("b"));
        assert_eq!(capture.error_count(), 1);
    }

    #[test]
    fn test_upload_cursor() {
        let hooks = HookRegistry::new();
        let capture = ErrorCapture::install(&hooks, None);

        capture.capture(ErrorRecord::UnhandledRejection { reason: json!(1) });
        capture.capture(ErrorRecord::UnhandledRejection { reason: json!(2) });

        let pending = capture.pending_upload();
        assert_eq!((pending.end, pending.records.len()), (2, 2));

        // arrives while the batch is in flight
        capture.capture(ErrorRecord::UnhandledRejection { reason: json!(3) });
        capture.mark_uploaded(pending.epoch, pending.end);

        let pending = capture.pending_upload();
        assert_eq!(pending.end, 3);
        assert_eq!(
            pending.records,
            vec![ErrorRecord::UnhandledRejection { reason: json!(3) }]
        );

        // the full log is still readable
        assert_eq!(capture.get_errors().len(), 3);
    }

    #[test]
    fn test_clear_during_upload_keeps_new_records_pending() {
        let hooks = HookRegistry::new();
        let capture = ErrorCapture::install(&hooks, None);

        capture.capture(ErrorRecord::UnhandledRejection { reason: json!(1) });
        capture.capture(ErrorRecord::UnhandledRejection { reason: json!(2) });
        let stale = capture.pending_upload();

        capture.clear_errors();
        capture.capture(ErrorRecord::UnhandledRejection { reason: json!("a") });
        capture.capture(ErrorRecord::UnhandledRejection { reason: json!("b") });

        // the in-flight batch commits against a log that no longer exists
        capture.mark_uploaded(stale.epoch, stale.end);

        let pending = capture.pending_upload();
        assert_ne!(pending.epoch, stale.epoch);
        assert_eq!(
            pending.records,
            vec![
                ErrorRecord::UnhandledRejection { reason: json!("a") },
                ErrorRecord::UnhandledRejection { reason: json!("b") },
            ]
        );
    }
}
