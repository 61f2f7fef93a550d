//! Optional interop tracer.
//!
//! Installing a tracer is a one-time, process-wide operation. When none is
//! installed, every hook below costs one atomic load.

use std::sync::OnceLock;

use vst3::Steinberg::tresult;

/// Which side initiated a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The host called into the plugin.
    HostToPlugin,
    /// The plugin called back into the host.
    PluginToHost,
}

/// Receives notifications about calls crossing the native boundary.
///
/// All methods have empty defaults. Implementations run on whatever thread
/// made the call, including the audio thread, and must not block.
pub trait InteropTracer: Send + Sync {
    /// A dispatch thunk is about to run `operation`.
    fn enter(&self, _operation: &'static str) {}

    /// A dispatch thunk returned `status`.
    fn exit(&self, _operation: &'static str, _status: tresult) {}

    /// A dispatch thunk caught a failure.
    fn error(&self, _operation: &'static str, _message: &str) {}

    /// An interface query finished.
    fn query(&self, _direction: Direction, _iid: &[u8; 16], _found: bool) {}
}

static TRACER: OnceLock<Box<dyn InteropTracer>> = OnceLock::new();

/// Install the process-wide tracer. Returns `false` if one is already set.
pub fn install_tracer(tracer: Box<dyn InteropTracer>) -> bool {
    TRACER.set(tracer).is_ok()
}

#[inline]
pub(crate) fn tracer() -> Option<&'static dyn InteropTracer> {
    TRACER.get().map(|t| t.as_ref())
}

#[inline]
pub(crate) fn trace_query(direction: Direction, iid: &[u8; 16], found: bool) {
    if let Some(tracer) = tracer() {
        tracer.query(direction, iid, found);
    }
}
