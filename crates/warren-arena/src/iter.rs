//! Enumeration over live objects.
//!
//! Two walks, matching the two access patterns of the layers above:
//!
//! - [`ActiveIter`] follows the global active list, visiting every chunk
//!   with live slots across all threads. Unordered and weakly consistent
//!   under concurrent mutation; never faults and never blocks.
//! - [`ThreadIter`] walks one thread's chunk set in index order,
//!   regardless of attach status, skipping empty chunks. Deterministic
//!   when the owning thread is quiescent.
//!
//! Both snapshot a chunk's occupancy mask on entry and yield an
//! [`EntityRef`] per set bit, reading each slot's generation as it goes.
//! A ref whose slot is freed after being yielded simply fails its next
//! validation.

use std::sync::atomic::Ordering;

use warren_core::{EntityRef, Handle};

use crate::chunk::Chunk;
use crate::chunkset::{resolve, ChunkSet};
use crate::link::Link;

/// Per-chunk cursor shared by both iterators: the occupancy snapshot
/// with already-yielded bits cleared.
struct SlotBits<'a> {
    chunk: &'a Chunk,
    handle: Handle,
    remaining: u32,
}

impl<'a> SlotBits<'a> {
    fn enter(chunk: &'a Chunk, handle: Handle) -> Self {
        Self {
            chunk,
            handle,
            remaining: chunk.occupancy_snapshot(),
        }
    }

    fn next_ref(&mut self) -> Option<EntityRef> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.remaining.trailing_zeros();
        self.remaining &= self.remaining - 1;
        let generation = self.chunk.generation(slot as usize);
        Some(EntityRef::new(self.handle, slot as u8, generation))
    }
}

/// Iterator over all live objects, via the global active list.
///
/// Created by [`Arena::iter`].
///
/// [`Arena::iter`]: crate::Arena::iter
pub struct ActiveIter<'a> {
    sets: &'a [ChunkSet],
    /// Next chunk to visit, captured from the current chunk's link on
    /// entry so a mid-walk detach of the current chunk cannot truncate
    /// the walk.
    next_handle: Handle,
    current: Option<SlotBits<'a>>,
}

impl<'a> ActiveIter<'a> {
    pub(crate) fn new(sets: &'a [ChunkSet], head: Handle) -> Self {
        Self {
            sets,
            next_handle: head,
            current: None,
        }
    }
}

impl Iterator for ActiveIter<'_> {
    type Item = EntityRef;

    fn next(&mut self) -> Option<EntityRef> {
        loop {
            if let Some(bits) = &mut self.current {
                if let Some(entity) = bits.next_ref() {
                    return Some(entity);
                }
                self.current = None;
            }
            if self.next_handle.is_null() {
                return None;
            }
            let handle = self.next_handle;
            let Some(chunk) = resolve(self.sets, handle) else {
                // Listed chunks always resolve; treat a failure as the
                // end of a torn snapshot rather than faulting.
                return None;
            };
            // Capture the successor before yielding slots (tag stripped:
            // a mid-relink successor is still a valid chunk to visit).
            self.next_handle = Link::from_raw(chunk.next.load(Ordering::Acquire)).handle();
            self.current = Some(SlotBits::enter(chunk, handle));
        }
    }
}

/// Iterator over one thread's live objects, in chunk index order.
///
/// Created by [`Arena::iter_thread`].
///
/// [`Arena::iter_thread`]: crate::Arena::iter_thread
pub struct ThreadIter<'a> {
    set: &'a ChunkSet,
    thread_index: usize,
    next_chunk: usize,
    current: Option<SlotBits<'a>>,
}

impl<'a> ThreadIter<'a> {
    pub(crate) fn new(set: &'a ChunkSet, thread_index: usize) -> Self {
        Self {
            set,
            thread_index,
            next_chunk: 0,
            current: None,
        }
    }
}

impl Iterator for ThreadIter<'_> {
    type Item = EntityRef;

    fn next(&mut self) -> Option<EntityRef> {
        loop {
            if let Some(bits) = &mut self.current {
                if let Some(entity) = bits.next_ref() {
                    return Some(entity);
                }
                self.current = None;
            }
            let chunk_index = self.next_chunk;
            let chunk = self.set.get(chunk_index)?;
            self.next_chunk += 1;
            if chunk.occupancy_snapshot() == 0 {
                continue;
            }
            let handle = Handle::pack(self.thread_index, chunk_index)
                .expect("existing chunk coordinates pack");
            self.current = Some(SlotBits::enter(chunk, handle));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::arena::Arena;
    use crate::chunk::SLOT_COUNT;
    use warren_core::EntityRef;

    #[test]
    fn active_iter_visits_every_live_object() {
        let arena = Arena::single_threaded();
        let mut expected = Vec::new();
        for i in 0..80u32 {
            expected.push(arena.create_local(i).unwrap());
        }
        // Punch holes so occupancy masks are sparse.
        for r in expected.iter().step_by(3).copied().collect::<Vec<_>>() {
            arena.free(r).unwrap();
            expected.retain(|e| e != &r);
        }

        let mut listed: Vec<EntityRef> = arena.iter().collect();
        listed.sort_by_key(|r| (r.handle.raw(), r.slot));
        expected.sort_by_key(|r| (r.handle.raw(), r.slot));
        assert_eq!(listed, expected);
    }

    #[test]
    fn thread_iter_is_in_chunk_order() {
        let arena = Arena::single_threaded();
        for i in 0..(SLOT_COUNT as u32 * 2 + 5) {
            arena.create_local(i).unwrap();
        }
        let chunks: Vec<usize> = arena
            .iter_thread(0)
            .unwrap()
            .map(|r| r.handle.chunk_index())
            .collect();
        assert!(chunks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(chunks.len(), SLOT_COUNT * 2 + 5);
    }

    #[test]
    fn thread_iter_skips_empty_chunks_but_not_detached_ones() {
        let arena = Arena::single_threaded();
        let mut first_chunk = Vec::new();
        for i in 0..SLOT_COUNT as u32 {
            first_chunk.push(arena.create_local(i).unwrap());
        }
        let keeper = arena.create_local(999u32).unwrap();
        // Empty chunk 0 entirely; it detaches from the active list.
        for r in first_chunk {
            arena.free(r).unwrap();
        }
        let listed: Vec<EntityRef> = arena.iter_thread(0).unwrap().collect();
        assert_eq!(listed, vec![keeper]);
    }

    #[test]
    fn iterators_yield_refs_that_validate() {
        let arena = Arena::single_threaded();
        for i in 0..10u64 {
            arena.create_local(i).unwrap();
        }
        for r in arena.iter() {
            assert!(arena.is_valid(r));
        }
        for r in arena.iter_thread(0).unwrap() {
            assert!(arena.is_valid(r));
        }
    }

    #[test]
    fn iteration_spans_threads() {
        let arena = Arena::new(crate::config::ArenaConfig::new(3)).unwrap();
        arena.create(0, 1u32).unwrap();
        arena.create(1, 2u32).unwrap();
        arena.create(2, 3u32).unwrap();
        let mut threads: Vec<usize> = arena.iter().map(|r| r.handle.thread_index()).collect();
        threads.sort_unstable();
        assert_eq!(threads, vec![0, 1, 2]);
        assert_eq!(arena.iter_thread(1).unwrap().count(), 1);
    }
}
