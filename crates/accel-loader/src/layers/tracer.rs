//! Call tracing layer.
//!
//! Every intercepted call is logged at `trace` level on entry and exit, and
//! handed to the registered [`Tracer`] callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use accel_api::{Call, InterceptLayer, Interceptor, ZeResult};
use parking_lot::RwLock;
use tracing::trace;

type EnterCallback = Box<dyn Fn(&'static str, &str) + Send + Sync>;
type ExitCallback = Box<dyn Fn(&'static str, ZeResult) + Send + Sync>;

/// A pair of callbacks run around every traced call.
///
/// `on_enter` receives the API name and a rendering of the arguments,
/// `on_exit` the API name and the result. A disabled tracer stays
/// registered but is skipped.
pub struct Tracer {
    enabled: AtomicBool,
    on_enter: Option<EnterCallback>,
    on_exit: Option<ExitCallback>,
}

impl Tracer {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            on_enter: None,
            on_exit: None,
        }
    }

    pub fn on_enter(mut self, f: impl Fn(&'static str, &str) + Send + Sync + 'static) -> Self {
        self.on_enter = Some(Box::new(f));
        self
    }

    pub fn on_exit(mut self, f: impl Fn(&'static str, ZeResult) + Send + Sync + 'static) -> Self {
        self.on_exit = Some(Box::new(f));
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracing hook: a registry of [`Tracer`]s.
#[derive(Default)]
pub struct ApiTracer {
    tracers: RwLock<Vec<Arc<Tracer>>>,
}

impl ApiTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tracer`. The returned handle can toggle it or unregister it.
    pub fn register(&self, tracer: Tracer) -> Arc<Tracer> {
        let tracer = Arc::new(tracer);
        self.tracers.write().push(Arc::clone(&tracer));
        tracer
    }

    /// Returns whether `tracer` was registered.
    pub fn unregister(&self, tracer: &Arc<Tracer>) -> bool {
        let mut tracers = self.tracers.write();
        let before = tracers.len();
        tracers.retain(|t| !Arc::ptr_eq(t, tracer));
        tracers.len() != before
    }

    pub fn tracer_count(&self) -> usize {
        self.tracers.read().len()
    }

    // Callbacks run on a snapshot so they may register or unregister
    // tracers themselves.
    fn active(&self) -> Vec<Arc<Tracer>> {
        self.tracers
            .read()
            .iter()
            .filter(|t| t.is_enabled())
            .cloned()
            .collect()
    }
}

impl Interceptor for ApiTracer {
    fn prologue(&self, call: &Call<'_>) -> Result<(), ZeResult> {
        let active = self.active();
        let wants_args = active.iter().any(|t| t.on_enter.is_some());
        if wants_args || tracing::enabled!(tracing::Level::TRACE) {
            let rendered = call.to_string();
            trace!(api = call.name, "enter {}", rendered);
            for tracer in &active {
                if let Some(on_enter) = &tracer.on_enter {
                    on_enter(call.name, &rendered);
                }
            }
        }
        Ok(())
    }

    fn epilogue(&self, name: &'static str, result: ZeResult) -> ZeResult {
        trace!(api = name, ?result, "exit");
        for tracer in &self.active() {
            if let Some(on_exit) = &tracer.on_exit {
                on_exit(name, result);
            }
        }
        result
    }
}

pub type TracingLayer = InterceptLayer<ApiTracer>;
