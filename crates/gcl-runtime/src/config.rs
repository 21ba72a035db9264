//! Configuration types for the host runtime.

use gcl_gc::GcConfig;

/// Event loop limits
#[derive(Debug, Clone, Default)]
pub struct LoopConfig {
    /// Maximum number of open idle handles. `None` means unlimited.
    pub max_handles: Option<usize>,
}

/// Runtime configuration
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Managed heap settings
    pub gc: GcConfig,
    /// Event loop settings
    pub event_loop: LoopConfig,
}

impl RuntimeConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the heap settings
    pub fn with_gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }

    /// Limit the number of open idle handles
    pub fn with_max_handles(mut self, limit: usize) -> Self {
        self.event_loop.max_handles = Some(limit);
        self
    }

    /// Limit the number of live heap objects
    pub fn with_max_objects(mut self, limit: usize) -> Self {
        self.gc.max_objects = Some(limit);
        self
    }
}
