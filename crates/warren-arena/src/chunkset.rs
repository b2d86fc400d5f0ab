//! Per-thread growable chunk arrays.
//!
//! A [`ChunkSet`] owns every chunk allocated for one worker thread. Only
//! that thread appends; any thread may resolve an index to a `&Chunk`
//! (handle resolution, enumeration, cross-thread frees). Two facts make
//! the cross-thread reads cheap and sound:
//!
//! - A published length is stored after a pushed chunk is fully
//!   initialised, so readers that bound their index by [`ChunkSet::len`]
//!   never observe a half-built entry.
//! - Chunks are boxed and never removed before the set is dropped, so a
//!   resolved `&Chunk` stays valid after the resolution guard is gone
//!   even if the index array itself reallocates.
//!
//! The only mutual exclusion needed is between the index array's
//! reallocation (growth) and concurrent index reads, and that is the
//! shared spin lock from [`crate::spin`].

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use warren_core::Handle;

use crate::chunk::Chunk;
use crate::spin::SpinShared;

/// Resolve a handle to its chunk across all thread sets.
///
/// `None` for null handles and for coordinates beyond the current sizes,
/// so stale handles fail validation instead of faulting.
pub(crate) fn resolve(sets: &[ChunkSet], handle: Handle) -> Option<&Chunk> {
    if handle.is_null() {
        return None;
    }
    sets.get(handle.thread_index())?.get(handle.chunk_index())
}

/// The growable chunk array owned by one worker thread.
pub(crate) struct ChunkSet {
    /// Guards the `chunks` Vec itself (not the chunks' contents).
    grow_lock: SpinShared,
    /// Number of fully-initialised entries. Published with `Release`
    /// after a push; readers bound every index by an `Acquire` load.
    published: AtomicUsize,
    /// The index array. Boxed entries give chunks stable addresses.
    chunks: UnsafeCell<Vec<Box<Chunk>>>,
}

// SAFETY: all shared mutation of `chunks` goes through `grow_lock`
// (exclusive for push, shared for index reads); `published` is atomic;
// Chunk is Sync by construction (atomics + payload lock + slab).
unsafe impl Send for ChunkSet {}
unsafe impl Sync for ChunkSet {}

impl ChunkSet {
    pub(crate) fn new() -> Self {
        Self {
            grow_lock: SpinShared::new(),
            published: AtomicUsize::new(0),
            chunks: UnsafeCell::new(Vec::new()),
        }
    }

    /// Number of chunks visible to readers.
    pub(crate) fn len(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }

    /// Resolve a chunk index.
    ///
    /// Returns `None` for indices at or beyond the published length, so
    /// stale handles degrade to a validation failure instead of a fault.
    pub(crate) fn get(&self, index: usize) -> Option<&Chunk> {
        if index >= self.len() {
            return None;
        }
        let _guard = self.grow_lock.read();
        // SAFETY: the shared guard excludes reallocation of the Vec while
        // we read the entry; the entry exists because index < published.
        let chunks = unsafe { &*self.chunks.get() };
        let ptr: *const Chunk = chunks[index].as_ref();
        // SAFETY: the &Chunk may outlive the guard — the Box target is
        // never moved or dropped until the set itself is dropped, which
        // requires exclusive access to the arena.
        Some(unsafe { &*ptr })
    }

    /// Append a chunk, returning its (permanent) index.
    ///
    /// Owner-thread-only by contract. Takes the exclusive side of the
    /// grow lock: appends happen at most once per `SLOT_COUNT`
    /// allocations per payload type, so the lock is cold.
    pub(crate) fn push(&self, chunk: Box<Chunk>) -> usize {
        let _guard = self.grow_lock.write();
        // SAFETY: the exclusive guard makes us the only accessor.
        let chunks = unsafe { &mut *self.chunks.get() };
        chunks.push(chunk);
        let index = chunks.len() - 1;
        self.published.store(chunks.len(), Ordering::Release);
        index
    }

    /// Sum of live counts over all published chunks.
    pub(crate) fn live_count(&self) -> usize {
        let mut total = 0i64;
        for index in 0..self.len() {
            if let Some(chunk) = self.get(index) {
                total += i64::from(chunk.live_count());
            }
        }
        total.max(0) as usize
    }

    /// Payload memory owned by this set's chunks, in bytes.
    pub(crate) fn memory_bytes(&self) -> usize {
        (0..self.len())
            .filter_map(|index| self.get(index))
            .map(Chunk::memory_bytes)
            .sum()
    }
}
