//! Packed chunk handles.
//!
//! A [`Handle`] names one chunk in the arena: which worker thread's chunk
//! set it lives in, and its index within that set. Handles are plain
//! integers so they can sit in a single atomic word inside the arena's
//! global active list.
//!
//! # Bit layout
//!
//! ```text
//! bit 31        bits 30..7          bits 6..1       bit 0
//! ┌────┬──────────────────────┬────────────────┬──────────┐
//! │ 0  │ chunk index (24 bit) │ thread (6 bit) │ non-null │
//! └────┴──────────────────────┴────────────────┴──────────┘
//! ```
//!
//! Bit 0 distinguishes the all-zero null handle from a real handle to
//! `(thread 0, chunk 0)`. Bit 31 is always clear in a handle; the arena's
//! active list reserves it as a link tag and that reservation is the only
//! reason the chunk index stops at 24 bits.

use std::fmt;

/// Maximum number of worker threads an arena can be configured for.
///
/// Fixed by the handle layout: 6 bits of thread index.
pub const MAX_WORKER_THREADS: usize = 64;

/// Maximum number of chunks a single thread's chunk set can hold.
///
/// Fixed by the handle layout: 24 bits of chunk index.
pub const MAX_CHUNKS_PER_THREAD: usize = 1 << 24;

const FLAG_BIT: u32 = 1;
const THREAD_SHIFT: u32 = 1;
const THREAD_BITS: u32 = 6;
const THREAD_MASK: u32 = (MAX_WORKER_THREADS as u32 - 1) << THREAD_SHIFT;
const CHUNK_SHIFT: u32 = THREAD_SHIFT + THREAD_BITS;

/// Packed identifier for one chunk: `(thread index, chunk index)`.
///
/// Handles are opaque to callers; they are produced by the arena on the
/// first allocation into a chunk and embedded in every [`EntityRef`]
/// pointing into that chunk.
///
/// [`EntityRef`]: crate::EntityRef
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct Handle(u32);

impl Handle {
    /// The null handle. Never names a chunk.
    pub const NULL: Handle = Handle(0);

    /// Pack a thread index and chunk index into a handle.
    ///
    /// Returns `None` if either index exceeds the bit layout's bounds.
    pub fn pack(thread_index: usize, chunk_index: usize) -> Option<Handle> {
        if thread_index >= MAX_WORKER_THREADS || chunk_index >= MAX_CHUNKS_PER_THREAD {
            return None;
        }
        Some(Handle(
            ((chunk_index as u32) << CHUNK_SHIFT)
                | ((thread_index as u32) << THREAD_SHIFT)
                | FLAG_BIT,
        ))
    }

    /// Reconstruct a handle from its raw bit pattern.
    ///
    /// Used by the arena's active list, which stores handles in atomic
    /// words. The raw value must have come from [`Handle::raw`].
    pub fn from_raw(raw: u32) -> Handle {
        Handle(raw)
    }

    /// The raw bit pattern. Bit 31 is always clear.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the null handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The worker thread whose chunk set owns the chunk.
    pub fn thread_index(self) -> usize {
        ((self.0 & THREAD_MASK) >> THREAD_SHIFT) as usize
    }

    /// The chunk's index within its owning chunk set.
    pub fn chunk_index(self) -> usize {
        (self.0 >> CHUNK_SHIFT) as usize
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::NULL
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle(null)")
        } else {
            write!(
                f,
                "Handle(thread={}, chunk={})",
                self.thread_index(),
                self.chunk_index()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_round_trip() {
        let h = Handle::pack(5, 1234).unwrap();
        assert_eq!(h.thread_index(), 5);
        assert_eq!(h.chunk_index(), 1234);
        assert!(!h.is_null());
    }

    #[test]
    fn zero_zero_is_not_null() {
        let h = Handle::pack(0, 0).unwrap();
        assert!(!h.is_null());
        assert_ne!(h, Handle::NULL);
    }

    #[test]
    fn bounds_rejected() {
        assert!(Handle::pack(MAX_WORKER_THREADS, 0).is_none());
        assert!(Handle::pack(0, MAX_CHUNKS_PER_THREAD).is_none());
    }

    #[test]
    fn extreme_indices_round_trip() {
        let h = Handle::pack(MAX_WORKER_THREADS - 1, MAX_CHUNKS_PER_THREAD - 1).unwrap();
        assert_eq!(h.thread_index(), MAX_WORKER_THREADS - 1);
        assert_eq!(h.chunk_index(), MAX_CHUNKS_PER_THREAD - 1);
        // Bit 31 stays clear even at the extremes.
        assert_eq!(h.raw() >> 31, 0);
    }

    #[test]
    fn raw_round_trip() {
        let h = Handle::pack(3, 7).unwrap();
        assert_eq!(Handle::from_raw(h.raw()), h);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_valid_pair_survives_packing(
                thread in 0usize..MAX_WORKER_THREADS,
                chunk in 0usize..MAX_CHUNKS_PER_THREAD,
            ) {
                let h = Handle::pack(thread, chunk).unwrap();
                prop_assert_eq!(h.thread_index(), thread);
                prop_assert_eq!(h.chunk_index(), chunk);
                prop_assert_eq!(h.raw() >> 31, 0);
                prop_assert!(!h.is_null());
            }

            #[test]
            fn distinct_pairs_pack_distinctly(
                a in (0usize..MAX_WORKER_THREADS, 0usize..MAX_CHUNKS_PER_THREAD),
                b in (0usize..MAX_WORKER_THREADS, 0usize..MAX_CHUNKS_PER_THREAD),
            ) {
                let ha = Handle::pack(a.0, a.1).unwrap();
                let hb = Handle::pack(b.0, b.1).unwrap();
                prop_assert_eq!(a == b, ha == hb);
            }
        }
    }
}
