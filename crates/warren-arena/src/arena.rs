//! The arena facade.
//!
//! [`Arena`] composes the per-thread chunk sets and the global active
//! list into the public surface: typed create/free, validated payload
//! access, counts, clearing, and enumeration.
//!
//! # Threading contract
//!
//! `create` is partitioned: calls with a given `thread_index` must come
//! from at most one thread at a time (each worker owns its index). Every
//! other `&self` operation — `free`, `is_valid`, `with`, `with_mut`,
//! counts, iteration — may be called from any thread concurrently. The
//! closure accessors hold their chunk's payload lock while the closure
//! runs and are therefore not reentrant per chunk (see [`Arena::with`]).
//!
//! # Payload discipline
//!
//! Payloads are plain data (`T: Copy + Send + Sync + 'static`). Freeing
//! a slot runs no destructor; it flips the occupancy bit and bumps the
//! slot's generation so every outstanding [`EntityRef`] to it goes stale.

#![allow(unsafe_code)]

use std::any::type_name;

use warren_core::{EntityRef, Handle, MAX_CHUNKS_PER_THREAD};

use crate::active::ActiveList;
use crate::chunk::{Chunk, FreeOutcome, SlotAlloc, SlotError, SLOT_COUNT};
use crate::chunkset::{resolve, ChunkSet};
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::iter::{ActiveIter, ThreadIter};

/// Payload bound: plain data the arena can store, share across threads,
/// and drop without running destructors.
pub trait Payload: Copy + Send + Sync + 'static {}

impl<T: Copy + Send + Sync + 'static> Payload for T {}

/// Thread-partitioned generational slot arena.
///
/// Objects live in 32-slot chunks owned by per-thread chunk sets; a
/// lock-free global list threads together every chunk with at least one
/// live slot. Callers hold [`EntityRef`]s — weak, generation-checked
/// references — instead of pointers.
///
/// Chunks are recycled logically and only released when the arena is
/// dropped; [`Arena::clear`] empties every chunk in O(chunk count)
/// without giving memory back.
pub struct Arena {
    /// One chunk set per worker thread.
    sets: Box<[ChunkSet]>,
    /// The global list of non-empty chunks.
    active: ActiveList,
    config: ArenaConfig,
}

impl Arena {
    /// Create an arena for the configured worker-thread count.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        if !config.is_valid() {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "worker_threads must be in 1..={} (got {})",
                    warren_core::MAX_WORKER_THREADS,
                    config.worker_threads,
                ),
            });
        }
        let sets = (0..config.worker_threads)
            .map(|_| ChunkSet::new())
            .collect();
        Ok(Self {
            sets,
            active: ActiveList::new(),
            config,
        })
    }

    /// Convenience constructor for a single-threaded arena.
    pub fn single_threaded() -> Self {
        Self::new(ArenaConfig::default()).expect("the default config is valid")
    }

    /// The configured worker-thread count.
    pub fn worker_threads(&self) -> usize {
        self.config.worker_threads
    }

    /// Allocate a slot on the given worker thread and move `value` in.
    ///
    /// Picks the first non-full chunk of `T`'s family in the thread's
    /// set, creating a new chunk when every existing one is full or of a
    /// different payload type. Attaches the chunk to the active list when
    /// this allocation is its first live slot.
    pub fn create<T: Payload>(
        &self,
        thread_index: usize,
        value: T,
    ) -> Result<EntityRef, ArenaError> {
        let set = self
            .sets
            .get(thread_index)
            .ok_or(ArenaError::ThreadOutOfRange {
                thread_index,
                worker_threads: self.config.worker_threads,
            })?;

        for chunk_index in 0..set.len() {
            let Some(chunk) = set.get(chunk_index) else {
                break;
            };
            if !chunk.holds::<T>() {
                continue;
            }
            if let Some(alloc) = chunk.try_alloc() {
                return Ok(self.finish_create(thread_index, chunk_index, chunk, alloc, value));
            }
        }

        if set.len() >= MAX_CHUNKS_PER_THREAD {
            return Err(ArenaError::CapacityExceeded {
                thread_index,
                chunks: set.len(),
            });
        }
        let chunk_index = set.push(Chunk::for_payload::<T>());
        let chunk = set.get(chunk_index).expect("pushed index resolves");
        // Only the owning thread allocates from this set, so the fresh
        // chunk cannot have been filled in the meantime.
        let alloc = chunk.try_alloc().expect("fresh chunk has a free slot");
        Ok(self.finish_create(thread_index, chunk_index, chunk, alloc, value))
    }

    /// Allocate on thread 0. Convenience for single-threaded callers.
    pub fn create_local<T: Payload>(&self, value: T) -> Result<EntityRef, ArenaError> {
        self.create(0, value)
    }

    fn finish_create<T: Payload>(
        &self,
        thread_index: usize,
        chunk_index: usize,
        chunk: &Chunk,
        alloc: SlotAlloc,
        value: T,
    ) -> EntityRef {
        // Both indices were bounds-checked on the way in, so packing
        // cannot fail.
        let handle = Handle::pack(thread_index, chunk_index).expect("indices already validated");
        let slot = alloc.slot() as usize;
        chunk.write_payload(slot, value);
        // Stable while we own the occupancy bit: only a free bumps it.
        let generation = chunk.generation(slot);
        if matches!(alloc, SlotAlloc::Fresh(_)) {
            self.active.attach(handle, chunk);
        }
        EntityRef::new(handle, slot as u8, generation)
    }

    /// Free the slot behind `entity`, validating its generation.
    ///
    /// A stale or double free is reported without mutating anything; the
    /// slot's current occupant (if any) is untouched. Detaches the chunk
    /// from the active list when this free empties it.
    pub fn free(&self, entity: EntityRef) -> Result<(), ArenaError> {
        let (chunk, slot) = self.locate(entity)?;
        match chunk.free_checked(slot, entity.generation) {
            Ok(FreeOutcome::StillLive) => Ok(()),
            Ok(FreeOutcome::Emptied) => {
                self.active.detach(entity.handle, chunk, &self.sets);
                Ok(())
            }
            Err(err) => Err(Self::slot_error(entity, err)),
        }
    }

    /// Whether `entity` currently names a live slot.
    ///
    /// Bounds are checked before anything else, so references from a
    /// cleared or differently-configured arena return `false` instead of
    /// faulting.
    pub fn is_valid(&self, entity: EntityRef) -> bool {
        let Ok((chunk, slot)) = self.locate(entity) else {
            return false;
        };
        chunk.is_occupied(slot) && chunk.generation(slot) == entity.generation
    }

    /// Run `f` over the payload behind `entity`.
    ///
    /// Validation (occupancy, generation) happens under the chunk's
    /// payload lock, so `f` always sees the complete value written by
    /// the occupant that passed validation.
    ///
    /// Not reentrant per chunk: `f` must not call [`Arena::with_mut`] or
    /// [`Arena::create`] for a slot in the same chunk — the payload lock
    /// is held for the duration of `f` and would self-deadlock. Nested
    /// `with` reads on the same chunk are fine (the lock is shared).
    pub fn with<T: Payload, R>(
        &self,
        entity: EntityRef,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, ArenaError> {
        let (chunk, slot) = self.locate_typed::<T>(entity)?;
        chunk
            .with_slot(slot, entity.generation, f)
            .map_err(|err| Self::slot_error(entity, err))
    }

    /// Run `f` over the payload behind `entity` mutably.
    ///
    /// Takes the chunk's payload lock exclusively for the duration of
    /// `f`; prefer [`Arena::get_mut`] in single-threaded phases.
    ///
    /// Not reentrant per chunk: `f` must not call any payload accessor
    /// or [`Arena::create`] for a slot in the same chunk — the exclusive
    /// lock is held while `f` runs and would self-deadlock.
    pub fn with_mut<T: Payload, R>(
        &self,
        entity: EntityRef,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, ArenaError> {
        let (chunk, slot) = self.locate_typed::<T>(entity)?;
        chunk
            .with_slot_mut(slot, entity.generation, f)
            .map_err(|err| Self::slot_error(entity, err))
    }

    /// Borrow the payload behind `entity` mutably, without locking.
    ///
    /// `&mut self` already excludes every other arena operation, so no
    /// payload lock is needed and the borrow can escape to the caller.
    pub fn get_mut<T: Payload>(&mut self, entity: EntityRef) -> Result<&mut T, ArenaError> {
        let ptr = {
            let (chunk, slot) = self.locate_typed::<T>(entity)?;
            chunk
                .with_slot(slot, entity.generation, |_: &T| ())
                .map_err(|err| Self::slot_error(entity, err))?;
            chunk.payload_ptr(slot) as *mut T
        };
        // SAFETY: validation just passed, so the slot holds an
        // initialised T; `&mut self` guarantees no concurrent access for
        // the borrow's lifetime, and the slab outlives `self`'s borrow.
        Ok(unsafe { &mut *ptr })
    }

    /// Number of live objects across all threads.
    pub fn live_count(&self) -> usize {
        self.sets.iter().map(ChunkSet::live_count).sum()
    }

    /// Number of live objects created on the given worker thread.
    pub fn live_count_for(&self, thread_index: usize) -> Result<usize, ArenaError> {
        self.sets
            .get(thread_index)
            .map(ChunkSet::live_count)
            .ok_or(ArenaError::ThreadOutOfRange {
                thread_index,
                worker_threads: self.config.worker_threads,
            })
    }

    /// Total number of chunks allocated so far, across all threads.
    pub fn chunk_count(&self) -> usize {
        self.sets.iter().map(ChunkSet::len).sum()
    }

    /// Payload memory owned by the arena, in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.sets.iter().map(ChunkSet::memory_bytes).sum()
    }

    /// Logically empty the arena without releasing chunk memory.
    ///
    /// O(chunk count). Every live slot's generation advances, so all
    /// outstanding references go permanently stale; subsequent creates
    /// reuse the existing chunks.
    pub fn clear(&mut self) {
        for set in self.sets.iter() {
            for chunk_index in 0..set.len() {
                if let Some(chunk) = set.get(chunk_index) {
                    chunk.clear();
                }
            }
        }
        self.active.reset();
    }

    /// Iterate every live object in the arena, in no particular order.
    ///
    /// Walks the global active list. Weakly consistent under concurrent
    /// mutation: objects created or freed mid-walk may or may not be
    /// observed, but the walk itself never faults. Validate yielded
    /// references with [`Arena::is_valid`] before acting on them if
    /// mutation is concurrent.
    pub fn iter(&self) -> ActiveIter<'_> {
        ActiveIter::new(&self.sets, self.active.head().handle())
    }

    /// Iterate the live objects created on one worker thread, in chunk
    /// index order.
    ///
    /// Walks the thread's chunk set directly, regardless of active-list
    /// status, skipping empty chunks. Deterministic when the owning
    /// thread is quiescent.
    pub fn iter_thread(&self, thread_index: usize) -> Result<ThreadIter<'_>, ArenaError> {
        let set = self
            .sets
            .get(thread_index)
            .ok_or(ArenaError::ThreadOutOfRange {
                thread_index,
                worker_threads: self.config.worker_threads,
            })?;
        Ok(ThreadIter::new(set, thread_index))
    }

    /// Resolve a reference to its chunk and slot index, bounds-checked.
    fn locate(&self, entity: EntityRef) -> Result<(&Chunk, usize), ArenaError> {
        let chunk =
            resolve(&self.sets, entity.handle).ok_or(ArenaError::OutOfBounds { entity })?;
        let slot = entity.slot as usize;
        if slot >= SLOT_COUNT {
            return Err(ArenaError::OutOfBounds { entity });
        }
        Ok((chunk, slot))
    }

    /// As [`Arena::locate`], plus the payload type check.
    fn locate_typed<T: Payload>(&self, entity: EntityRef) -> Result<(&Chunk, usize), ArenaError> {
        let (chunk, slot) = self.locate(entity)?;
        if !chunk.holds::<T>() {
            return Err(ArenaError::TypeMismatch {
                expected: chunk.type_name(),
                found: type_name::<T>(),
            });
        }
        Ok((chunk, slot))
    }

    fn slot_error(entity: EntityRef, err: SlotError) -> ArenaError {
        match err {
            SlotError::Vacant => ArenaError::VacantSlot {
                handle: entity.handle,
                slot: entity.slot,
            },
            SlotError::Stale { slot_generation } => ArenaError::StaleHandle {
                ref_generation: entity.generation,
                slot_generation,
            },
        }
    }
}
