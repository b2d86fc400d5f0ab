//! Arena configuration parameters.

use warren_core::MAX_WORKER_THREADS;

/// Configuration for the slot arena.
///
/// Validated by [`Arena::new`]; all values are immutable after creation.
///
/// [`Arena::new`]: crate::Arena::new
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Number of worker threads that may allocate concurrently.
    ///
    /// Each worker thread owns one chunk set; `create` calls for a given
    /// thread index must come from at most one thread at a time. Must be
    /// in `1..=MAX_WORKER_THREADS` (the handle layout reserves 6 bits).
    pub worker_threads: usize,
}

impl ArenaConfig {
    /// Default worker-thread count for a single-threaded arena.
    pub const DEFAULT_WORKER_THREADS: usize = 1;

    /// Create a config for the given worker-thread count.
    pub fn new(worker_threads: usize) -> Self {
        Self { worker_threads }
    }

    /// Whether the worker-thread count is within the handle layout's bounds.
    pub fn is_valid(&self) -> bool {
        self.worker_threads >= 1 && self.worker_threads <= MAX_WORKER_THREADS
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WORKER_THREADS)
    }
}
