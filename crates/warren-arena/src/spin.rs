//! Signed-integer shared spin lock.
//!
//! One atomic `i32` encodes three states: `0` unlocked, positive = that
//! many active readers, negative = one exclusive writer. The same
//! primitive guards chunk-set growth (writer = the growing owner thread,
//! readers = cross-thread resolution) and each chunk's payload area
//! (writer = slot-initialising create or `with_mut`, readers = `with`).
//!
//! All waits are short by construction: writers hold the lock for a
//! `Vec::push` or a single payload read/write closure.

use std::sync::atomic::{AtomicI32, Ordering};

const UNLOCKED: i32 = 0;
const WRITER: i32 = -1;

/// Bounded-spin helper for CAS retry loops.
///
/// Spins on the CPU hint for the first rounds, then starts yielding the
/// thread so a preempted lock holder can make progress.
pub(crate) struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;

    pub(crate) fn new() -> Self {
        Self { step: 0 }
    }

    pub(crate) fn wait(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1 << self.step) {
                std::hint::spin_loop();
            }
            self.step += 1;
        } else {
            std::thread::yield_now();
        }
    }
}

/// Reader/writer spin lock over a signed counter.
pub(crate) struct SpinShared {
    state: AtomicI32,
}

impl SpinShared {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicI32::new(UNLOCKED),
        }
    }

    /// Acquire the shared (reader) side.
    pub(crate) fn read(&self) -> ReadGuard<'_> {
        let mut backoff = Backoff::new();
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state >= 0
                && self
                    .state
                    .compare_exchange_weak(state, state + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return ReadGuard { lock: self };
            }
            backoff.wait();
        }
    }

    /// Acquire the exclusive (writer) side.
    pub(crate) fn write(&self) -> WriteGuard<'_> {
        let mut backoff = Backoff::new();
        loop {
            if self
                .state
                .compare_exchange_weak(UNLOCKED, WRITER, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return WriteGuard { lock: self };
            }
            backoff.wait();
        }
    }
}

/// RAII guard for the shared side.
pub(crate) struct ReadGuard<'a> {
    lock: &'a SpinShared,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(1, Ordering::Release);
    }
}

/// RAII guard for the exclusive side.
pub(crate) struct WriteGuard<'a> {
    lock: &'a SpinShared,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.state.store(UNLOCKED, Ordering::Release);
    }
}
