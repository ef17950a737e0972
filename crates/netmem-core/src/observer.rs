//! Observer hooks for pool instrumentation.
//!
//! The pool calls these on every acquire/release. Every method defaults to a
//! no-op so an observer only overrides what it records. The concrete census
//! lives in `netmem-mem` behind the `census` feature.

/// Receives allocation and view lifecycle events from a chunk pool.
///
/// Implementations must be cheap: they run on the allocation hot path.
pub trait PoolObserver: Send + Sync + 'static {
    /// A chunk was handed out. `class_size` is the pooled class, or the exact
    /// length for oversize chunks.
    fn on_acquire(&self, _requested: usize, _class_size: usize) {}

    /// A chunk went back to its bucket (or was freed, if oversize).
    fn on_release(&self, _class_size: usize) {}

    /// A tagged view was created.
    fn on_view_created(&self, _tag: &'static str) {}

    /// A tagged view was released.
    fn on_view_released(&self, _tag: &'static str) {}
}

/// Observer that ignores every event. Installed when nothing else is.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PoolObserver for NoopObserver {}
