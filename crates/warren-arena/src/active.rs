//! The global active list: a lock-free singly-linked list of every chunk
//! that currently holds at least one live slot.
//!
//! This is the arena's single cross-thread serialisation point, touched
//! only on a chunk's empty→non-empty (attach) and non-empty→empty
//! (detach) transitions — never on ordinary slot alloc/free.
//!
//! # State machine
//!
//! Each chunk carries a status word cycling
//! `Detached → Attaching → Attached → Detaching → Detached`. The entry
//! CAS on the status word elects exactly one thread to perform each
//! transition. A loser whose goal the winner already achieves abandons;
//! a loser racing the *opposite* transition retries with backoff, because
//! abandoning there would strand the chunk (a live chunk off the list, or
//! an empty one on it). Both opposing transitions complete in a bounded
//! number of steps, so the retry preserves lock-freedom.
//!
//! # Links
//!
//! List membership is threaded through each chunk's `next` word as a
//! tagged [`Link`]. A transitional tag means "this node's successor is
//! being rewritten": detach walks that read a transitional link restart
//! from the head instead of splicing across it. The head word itself
//! always holds a plain handle.

use std::sync::atomic::{AtomicU32, Ordering};

use warren_core::Handle;

use crate::chunk::{Chunk, ChunkStatus};
use crate::chunkset::{resolve, ChunkSet};
use crate::link::Link;
use crate::spin::Backoff;

/// Head of the active list. One per arena.
pub(crate) struct ActiveList {
    /// Plain [`Link`] word: the most recently attached chunk, or null.
    head: AtomicU32,
}

impl ActiveList {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicU32::new(Link::NULL.raw()),
        }
    }

    /// Current head link (always plain).
    pub(crate) fn head(&self) -> Link {
        Link::from_raw(self.head.load(Ordering::Acquire))
    }

    /// Whether the list is empty.
    pub(crate) fn is_empty(&self) -> bool {
        self.head().is_null()
    }

    /// Reset to empty. Caller must hold exclusive access to the arena.
    pub(crate) fn reset(&self) {
        self.head.store(Link::NULL.raw(), Ordering::Release);
    }

    /// Put `chunk` on the list after its first slot went live.
    ///
    /// Idempotent under races: if another thread is already attaching or
    /// has attached the chunk, this returns without touching the list.
    pub(crate) fn attach(&self, handle: Handle, chunk: &Chunk) {
        let mut backoff = Backoff::new();
        loop {
            match chunk.status.compare_exchange(
                ChunkStatus::Detached as u32,
                ChunkStatus::Attaching as u32,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => match ChunkStatus::from_u32(current) {
                    // Another thread already guarantees membership.
                    ChunkStatus::Attaching | ChunkStatus::Attached => return,
                    // A detacher is mid-flight. Abandoning here would
                    // leave a live chunk off the list, so wait it out:
                    // it either aborts back to Attached or completes to
                    // Detached, both in bounded steps.
                    ChunkStatus::Detaching => backoff.wait(),
                    // Became Detached again between the failed CAS and
                    // now; retry.
                    ChunkStatus::Detached => {}
                },
            }
        }

        // Push onto the head. The chunk is not yet reachable from the
        // list, so a plain store to its next word is fine; it stays
        // tagged transitional until the push lands so that walkers who
        // find us via the new head don't splice across a half-written
        // successor.
        let mut backoff = Backoff::new();
        let old_head = loop {
            let old = self.head.load(Ordering::Acquire);
            chunk
                .next
                .store(Link::transitional(Handle::from_raw(old)).raw(), Ordering::Release);
            if self
                .head
                .compare_exchange_weak(old, handle.raw(), Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break Handle::from_raw(old);
            }
            backoff.wait();
        };
        chunk
            .next
            .store(Link::plain(old_head).raw(), Ordering::Release);

        let prev = chunk
            .status
            .swap(ChunkStatus::Attached as u32, Ordering::AcqRel);
        debug_assert_eq!(prev, ChunkStatus::Attaching as u32);
    }

    /// Take `chunk` off the list after its last slot was freed.
    ///
    /// Aborts (leaving the chunk attached) if a concurrent allocation
    /// made the chunk non-empty again — correctness over eagerness.
    pub(crate) fn detach(&self, handle: Handle, chunk: &Chunk, sets: &[ChunkSet]) {
        let mut backoff = Backoff::new();
        loop {
            match chunk.status.compare_exchange(
                ChunkStatus::Attached as u32,
                ChunkStatus::Detaching as u32,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => match ChunkStatus::from_u32(current) {
                    // Not on the list / another detacher owns it.
                    ChunkStatus::Detached | ChunkStatus::Detaching => return,
                    // An attacher is mid-push. Wait it out, then decide
                    // again — if the chunk is still empty once Attached,
                    // the detach must proceed.
                    ChunkStatus::Attaching => backoff.wait(),
                    ChunkStatus::Attached => {}
                },
            }
        }

        // The empty observation that triggered this detach may already be
        // stale: an allocation can land between the triggering free and
        // the status CAS. Abort rather than unlink a live chunk.
        if chunk.live_count() > 0 {
            chunk
                .status
                .store(ChunkStatus::Attached as u32, Ordering::Release);
            return;
        }

        // Freeze our successor. The next word can be rewritten under us
        // by a detaching successor's predecessor-splice, so the tag goes
        // on with a CAS; once tagged, nobody else writes the word.
        let mut backoff = Backoff::new();
        let successor = loop {
            let link = Link::from_raw(chunk.next.load(Ordering::Acquire));
            debug_assert!(!link.is_transitional());
            if chunk
                .next
                .compare_exchange_weak(
                    link.raw(),
                    Link::transitional(link.handle()).raw(),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break link.handle();
            }
            backoff.wait();
        };

        // Unlink: head fast path, then predecessor walk.
        let mut backoff = Backoff::new();
        'retry: loop {
            if self
                .head
                .compare_exchange(
                    handle.raw(),
                    successor.raw(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                break;
            }

            let mut cursor = self.head().handle();
            loop {
                if cursor.is_null() || cursor == handle {
                    // Stale snapshot: the list changed under the walk.
                    backoff.wait();
                    continue 'retry;
                }
                let Some(node) = resolve(sets, cursor) else {
                    backoff.wait();
                    continue 'retry;
                };
                let link = Link::from_raw(node.next.load(Ordering::Acquire));
                if link.is_transitional() {
                    // The node's successor is mid-relink; splicing here
                    // could resurrect an unlinked chunk. Restart.
                    backoff.wait();
                    continue 'retry;
                }
                if link.handle() == handle {
                    if node
                        .next
                        .compare_exchange(
                            link.raw(),
                            Link::plain(successor).raw(),
                            Ordering::AcqRel,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                    {
                        break 'retry;
                    }
                    backoff.wait();
                    continue 'retry;
                }
                cursor = link.handle();
            }
        }

        chunk.next.store(Link::NULL.raw(), Ordering::Release);
        chunk
            .status
            .store(ChunkStatus::Detached as u32, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(count: usize) -> (Vec<ChunkSet>, Vec<Handle>) {
        let sets = vec![ChunkSet::new()];
        let mut handles = Vec::new();
        for _ in 0..count {
            let index = sets[0].push(Chunk::for_payload::<u32>());
            handles.push(Handle::pack(0, index).unwrap());
        }
        (sets, handles)
    }

    fn collect(list: &ActiveList, sets: &[ChunkSet]) -> Vec<Handle> {
        let mut out = Vec::new();
        let mut cursor = list.head().handle();
        while !cursor.is_null() {
            out.push(cursor);
            let chunk = resolve(sets, cursor).unwrap();
            cursor = Link::from_raw(chunk.next.load(Ordering::Acquire)).handle();
        }
        out
    }

    #[test]
    fn attach_pushes_to_head() {
        let (sets, handles) = setup(3);
        let list = ActiveList::new();
        for &h in &handles {
            list.attach(h, resolve(&sets, h).unwrap());
        }
        assert_eq!(collect(&list, &sets), vec![handles[2], handles[1], handles[0]]);
    }

    #[test]
    fn attach_is_idempotent() {
        let (sets, handles) = setup(1);
        let list = ActiveList::new();
        let chunk = resolve(&sets, handles[0]).unwrap();
        list.attach(handles[0], chunk);
        list.attach(handles[0], chunk);
        assert_eq!(collect(&list, &sets).len(), 1);
    }

    #[test]
    fn detach_from_head_middle_tail() {
        let (sets, handles) = setup(3);
        let list = ActiveList::new();
        for &h in &handles {
            list.attach(h, resolve(&sets, h).unwrap());
        }
        // List is [2, 1, 0]. Remove the middle, then head, then tail.
        list.detach(handles[1], resolve(&sets, handles[1]).unwrap(), &sets);
        assert_eq!(collect(&list, &sets), vec![handles[2], handles[0]]);
        list.detach(handles[2], resolve(&sets, handles[2]).unwrap(), &sets);
        assert_eq!(collect(&list, &sets), vec![handles[0]]);
        list.detach(handles[0], resolve(&sets, handles[0]).unwrap(), &sets);
        assert!(list.is_empty());
    }

    #[test]
    fn detach_aborts_when_chunk_went_live() {
        let (sets, handles) = setup(1);
        let list = ActiveList::new();
        let chunk = resolve(&sets, handles[0]).unwrap();
        list.attach(handles[0], chunk);
        chunk.try_alloc().unwrap();
        list.detach(handles[0], chunk, &sets);
        // Still attached: the live slot wins.
        assert_eq!(collect(&list, &sets), vec![handles[0]]);
        assert_eq!(
            ChunkStatus::from_u32(chunk.status.load(Ordering::Acquire)),
            ChunkStatus::Attached
        );
    }

    #[test]
    fn detach_of_detached_chunk_is_a_no_op() {
        let (sets, handles) = setup(1);
        let list = ActiveList::new();
        let chunk = resolve(&sets, handles[0]).unwrap();
        list.detach(handles[0], chunk, &sets);
        assert!(list.is_empty());
    }

    #[test]
    fn attach_detach_cycle_restores_detached_state() {
        let (sets, handles) = setup(1);
        let list = ActiveList::new();
        let chunk = resolve(&sets, handles[0]).unwrap();
        for _ in 0..10 {
            list.attach(handles[0], chunk);
            list.detach(handles[0], chunk, &sets);
        }
        assert!(list.is_empty());
        assert_eq!(
            ChunkStatus::from_u32(chunk.status.load(Ordering::Acquire)),
            ChunkStatus::Detached
        );
        assert_eq!(Link::from_raw(chunk.next.load(Ordering::Acquire)), Link::NULL);
    }

    #[test]
    fn concurrent_attach_detach_churn_leaves_list_empty() {
        use std::sync::Arc;

        let (sets, handles) = setup(8);
        let sets = Arc::new(sets);
        let list = Arc::new(ActiveList::new());

        let mut joins = Vec::new();
        for worker in 0..4 {
            let sets = Arc::clone(&sets);
            let list = Arc::clone(&list);
            let handles = handles.clone();
            joins.push(std::thread::spawn(move || {
                for round in 0..500 {
                    let h = handles[(worker + round) % handles.len()];
                    let chunk = resolve(&sets, h).unwrap();
                    if let Some(alloc) = chunk.try_alloc() {
                        if matches!(alloc, crate::chunk::SlotAlloc::Fresh(_)) {
                            list.attach(h, chunk);
                        }
                        let slot = alloc.slot() as usize;
                        let generation = chunk.generation(slot);
                        if chunk.free_checked(slot, generation).unwrap()
                            == crate::chunk::FreeOutcome::Emptied
                        {
                            list.detach(h, chunk, &sets);
                        }
                    }
                }
            }));
        }
        for j in joins {
            j.join().unwrap();
        }

        // Every alloc was matched by a free; no chunk may remain listed
        // with live slots, and any chunk still listed must be empty.
        for &h in &handles {
            assert_eq!(resolve(&sets, h).unwrap().live_count(), 0);
        }
        let leftover = collect(&list, &sets);
        for h in leftover {
            assert_eq!(resolve(&sets, h).unwrap().live_count(), 0);
        }
    }
}
