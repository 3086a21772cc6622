// src/tracking/hooks.rs
//! Host error signal boundary
//!
//! The host owns the global error hooks; the monitor registers one handler per
//! hook kind. [`HookRegistry`] is the in-process implementation host bindings
//! dispatch native signals into.

use crate::utils::errors::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Global hook a handler is installed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Uncaught synchronous errors
    GlobalError,

    /// Promise rejections without a handler
    UnhandledRejection,

    /// Capture-phase load errors (elements and window alike)
    ResourceLoad,
}

impl HookKind {
    pub const ALL: [HookKind; 3] = [
        HookKind::GlobalError,
        HookKind::UnhandledRejection,
        HookKind::ResourceLoad,
    ];
}

/// Element type of a resource-load target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Image,
    Script,
    Link,
    Other(String),
}

/// Element whose load failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTarget {
    pub element: ElementKind,
    pub src: Option<String>,
    pub href: Option<String>,
    pub outer_html: String,
}

/// Raw signal as delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub enum NativeSignal {
    Error {
        message: String,
        source: String,
        lineno: u32,
        colno: u32,
        stack: Option<String>,
    },
    Rejection {
        reason: serde_json::Value,
    },
    /// `target` is `None` when the event did not originate on an element
    ResourceLoad {
        target: Option<ResourceTarget>,
    },
}

impl NativeSignal {
    pub fn hook(&self) -> HookKind {
        match self {
            NativeSignal::Error { .. } => HookKind::GlobalError,
            NativeSignal::Rejection { .. } => HookKind::UnhandledRejection,
            NativeSignal::ResourceLoad { .. } => HookKind::ResourceLoad,
        }
    }
}

/// Handler installed on a hook
pub type SignalHandler = Arc<dyn Fn(NativeSignal) + Send + Sync>;

/// Host interface for installing global error hooks
pub trait ErrorHooks: Send + Sync {
    fn install(&self, kind: HookKind, handler: SignalHandler) -> Result<()>;
}

/// In-process hook registry
#[derive(Default)]
pub struct HookRegistry {
    handlers: RwLock<HashMap<HookKind, Vec<SignalHandler>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a signal to the handlers on its hook; returns how many ran
    pub fn dispatch(&self, signal: NativeSignal) -> usize {
        let kind = signal.hook();
        let handlers = self
            .handlers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        trace!(?kind, handlers = handlers.len(), "Dispatching native signal");

        for handler in &handlers {
            handler(signal.clone());
        }
        handlers.len()
    }

    pub fn handler_count(&self, kind: HookKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }
}

impl ErrorHooks for HookRegistry {
    fn install(&self, kind: HookKind, handler: SignalHandler) -> Result<()> {
        debug!(?kind, "Installing error hook");
        self.handlers.write().entry(kind).or_default().push(handler);
        Ok(())
    }
}
