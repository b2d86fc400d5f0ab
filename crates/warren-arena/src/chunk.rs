//! Fixed 32-slot chunks: occupancy bitmask, generations, attach status.
//!
//! A [`Chunk`] is the unit of storage and of active-list membership. All
//! slots in a chunk hold the same payload type; the payload bytes live in
//! a raw [`SlotSlab`], while this module owns the concurrent bookkeeping:
//! the occupancy bitmask, the live counter, the per-slot generation
//! counters, and the attach/detach status word driven by the active list.
//!
//! Slot allocation never blocks: a live-counter reservation bounds the
//! number of claimants, then a CAS retry loop claims the lowest clear
//! occupancy bit. Frees arbitrate through a generation CAS so that racing
//! frees of the same slot resolve to exactly one winner, and a stale
//! reference can never invalidate the slot's current occupant.

#![allow(unsafe_code)]

use std::any::TypeId;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use crate::link::Link;
use crate::slab::SlotSlab;
use crate::spin::{Backoff, SpinShared};

/// Number of slots per chunk.
///
/// Hard-fixed: the handle layout reserves exactly 5 bits of in-chunk
/// index and the occupancy mask is one 32-bit word.
pub const SLOT_COUNT: usize = 32;

/// Active-list membership state. Transitions are CAS-guarded cycles:
/// `Detached → Attaching → Attached → Detaching → Detached`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum ChunkStatus {
    /// Not on the active list.
    Detached = 0,
    /// Being pushed onto the active list.
    Attaching = 1,
    /// On the active list.
    Attached = 2,
    /// Being unlinked from the active list.
    Detaching = 3,
}

impl ChunkStatus {
    pub(crate) fn from_u32(v: u32) -> ChunkStatus {
        match v {
            0 => ChunkStatus::Detached,
            1 => ChunkStatus::Attaching,
            2 => ChunkStatus::Attached,
            3 => ChunkStatus::Detaching,
            _ => unreachable!("invalid chunk status word"),
        }
    }
}

/// Result of a successful slot allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotAlloc {
    /// The allocation took the chunk from empty to non-empty; the caller
    /// must attach the chunk to the active list.
    Fresh(u8),
    /// The chunk already had live slots.
    Occupied(u8),
}

impl SlotAlloc {
    pub(crate) fn slot(self) -> u8 {
        match self {
            SlotAlloc::Fresh(s) | SlotAlloc::Occupied(s) => s,
        }
    }
}

/// Result of a successful slot free.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FreeOutcome {
    /// The chunk still has live slots.
    StillLive,
    /// The free emptied the chunk; the caller must detach it.
    Emptied,
}

/// Why a free or typed access was refused. Mapped to `ArenaError` by the
/// facade, which has the handle context this module deliberately lacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotError {
    /// The occupancy bit was clear (double free, or never live).
    Vacant,
    /// The generation did not match: the reference is stale. Nothing was
    /// mutated.
    Stale {
        /// The slot's current generation.
        slot_generation: u32,
    },
}

/// A 32-slot block of same-typed storage with lock-free bookkeeping.
pub(crate) struct Chunk {
    /// Payload type this chunk was created for.
    type_id: TypeId,
    /// Its name, kept for error reporting.
    type_name: &'static str,
    /// One bit per slot; set = occupied.
    occupancy: AtomicU32,
    /// Count of occupied slots. `popcount(occupancy) == live` at rest;
    /// transiently `live` runs ahead during alloc and free windows.
    live: AtomicI32,
    /// [`ChunkStatus`] word, owned by the active list's state machine.
    pub(crate) status: AtomicU32,
    /// [`Link`] word: this chunk's successor on the active list.
    pub(crate) next: AtomicU32,
    /// Per-slot reuse counters. Bumped on every occupied→free transition,
    /// never reset.
    generations: [AtomicU32; SLOT_COUNT],
    /// Guards the payload bytes: shared for reads, exclusive for writes
    /// (including the initialising write during create).
    payload_lock: SpinShared,
    /// The payload bytes themselves.
    slab: SlotSlab,
}

impl Chunk {
    /// Create an empty, detached chunk for payloads of type `T`.
    pub(crate) fn for_payload<T: 'static>() -> Box<Chunk> {
        Box::new(Chunk {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            occupancy: AtomicU32::new(0),
            live: AtomicI32::new(0),
            status: AtomicU32::new(ChunkStatus::Detached as u32),
            next: AtomicU32::new(Link::NULL.raw()),
            generations: std::array::from_fn(|_| AtomicU32::new(0)),
            payload_lock: SpinShared::new(),
            slab: SlotSlab::new(std::mem::size_of::<T>(), std::mem::align_of::<T>()),
        })
    }

    /// Whether this chunk stores payloads of type `T`.
    pub(crate) fn holds<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Name of the payload type, for error reporting.
    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Claim a free slot, or `None` if the chunk is full.
    ///
    /// Full is an internal signal: the caller tries the next chunk.
    pub(crate) fn try_alloc(&self) -> Option<SlotAlloc> {
        // Reserve first: at most SLOT_COUNT claimants ever hold a
        // reservation, which guarantees the bit scan below finds a clear
        // bit.
        let prev = self.live.fetch_add(1, Ordering::AcqRel);
        if prev >= SLOT_COUNT as i32 {
            self.live.fetch_sub(1, Ordering::AcqRel);
            return None;
        }

        let mut backoff = Backoff::new();
        loop {
            let mask = self.occupancy.load(Ordering::Acquire);
            let free = !mask;
            if free == 0 {
                // Unreachable while we hold a reservation: set bits stay
                // strictly below live + pending claims. Retry in release.
                debug_assert_ne!(free, 0);
                backoff.wait();
                continue;
            }
            let bit = free.trailing_zeros();
            if self
                .occupancy
                .compare_exchange_weak(
                    mask,
                    mask | (1 << bit),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                let slot = bit as u8;
                return Some(if prev == 0 {
                    SlotAlloc::Fresh(slot)
                } else {
                    SlotAlloc::Occupied(slot)
                });
            }
            backoff.wait();
        }
    }

    /// Free an occupied slot, validating the caller's generation.
    ///
    /// The generation CAS is the arbiter between racing frees: the winner
    /// bumps the generation and is then the unique thread entitled to
    /// clear the occupancy bit. Ordering matters — bumping before the
    /// clear means a realloc of this slot (which can only start after the
    /// clear) always reads the post-free generation.
    pub(crate) fn free_checked(
        &self,
        slot: usize,
        expected_generation: u32,
    ) -> Result<FreeOutcome, SlotError> {
        debug_assert!(slot < SLOT_COUNT);
        let bit = 1u32 << slot;

        if self.occupancy.load(Ordering::Acquire) & bit == 0 {
            return Err(SlotError::Vacant);
        }

        if let Err(current) = self.generations[slot].compare_exchange(
            expected_generation,
            expected_generation.wrapping_add(1),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(SlotError::Stale {
                slot_generation: current,
            });
        }

        let old = self.occupancy.fetch_and(!bit, Ordering::AcqRel);
        debug_assert_ne!(old & bit, 0, "generation winner found the bit clear");

        let prev = self.live.fetch_sub(1, Ordering::AcqRel);
        if prev == 1 {
            Ok(FreeOutcome::Emptied)
        } else {
            Ok(FreeOutcome::StillLive)
        }
    }

    /// The slot's current generation.
    pub(crate) fn generation(&self, slot: usize) -> u32 {
        debug_assert!(slot < SLOT_COUNT);
        self.generations[slot].load(Ordering::Acquire)
    }

    /// Whether the slot's occupancy bit is set.
    pub(crate) fn is_occupied(&self, slot: usize) -> bool {
        debug_assert!(slot < SLOT_COUNT);
        self.occupancy.load(Ordering::Acquire) & (1 << slot) != 0
    }

    /// Point-in-time copy of the occupancy mask.
    pub(crate) fn occupancy_snapshot(&self) -> u32 {
        self.occupancy.load(Ordering::Acquire)
    }

    /// Current live-slot count. Transiently overshoots during concurrent
    /// alloc/free windows; exact at rest.
    pub(crate) fn live_count(&self) -> i32 {
        self.live.load(Ordering::Acquire)
    }

    /// Raw pointer to a slot's payload bytes.
    ///
    /// For the facade's exclusive accessor, where `&mut Arena` already
    /// excludes every concurrent reader and writer.
    pub(crate) fn payload_ptr(&self, slot: usize) -> *mut u8 {
        self.slab.slot_ptr(slot)
    }

    /// Write the initialising payload value into a just-allocated slot.
    ///
    /// Takes the exclusive side of the payload lock so that shared
    /// readers of a recycled slot never observe a torn write.
    pub(crate) fn write_payload<T: 'static>(&self, slot: usize, value: T) {
        debug_assert!(slot < SLOT_COUNT);
        debug_assert!(self.holds::<T>());
        let _guard = self.payload_lock.write();
        // SAFETY: slot is in bounds, the slab was laid out for T (holds
        // checked above), the caller owns the freshly-claimed slot, and
        // the exclusive guard excludes concurrent payload readers.
        unsafe { (self.slab.slot_ptr(slot) as *mut T).write(value) };
    }

    /// Run `f` over the slot's payload, validating occupancy and
    /// generation under the payload lock.
    ///
    /// Validation and the read share the lock's critical section, so the
    /// bytes seen by `f` are the complete initialising write of the
    /// occupant that passed validation (a free that races in after
    /// validation does not touch payload bytes).
    pub(crate) fn with_slot<T: 'static, R>(
        &self,
        slot: usize,
        expected_generation: u32,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, SlotError> {
        debug_assert!(slot < SLOT_COUNT);
        debug_assert!(self.holds::<T>());
        let _guard = self.payload_lock.read();
        self.validate(slot, expected_generation)?;
        // SAFETY: the slab is laid out for T; validation passed, so the
        // slot holds a fully-initialised T (its write happened under the
        // exclusive side of this lock); the shared guard excludes
        // initialising writes for the duration of `f`.
        Ok(f(unsafe { &*(self.slab.slot_ptr(slot) as *const T) }))
    }

    /// Run `f` over the slot's payload mutably. Exclusive counterpart of
    /// [`Chunk::with_slot`].
    pub(crate) fn with_slot_mut<T: 'static, R>(
        &self,
        slot: usize,
        expected_generation: u32,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, SlotError> {
        debug_assert!(slot < SLOT_COUNT);
        debug_assert!(self.holds::<T>());
        let _guard = self.payload_lock.write();
        self.validate(slot, expected_generation)?;
        // SAFETY: as in with_slot, plus the exclusive guard makes this
        // the only payload access in the chunk while `f` runs.
        Ok(f(unsafe { &mut *(self.slab.slot_ptr(slot) as *mut T) }))
    }

    /// Occupancy and generation check shared by the typed accessors.
    fn validate(&self, slot: usize, expected_generation: u32) -> Result<(), SlotError> {
        if !self.is_occupied(slot) {
            return Err(SlotError::Vacant);
        }
        let current = self.generation(slot);
        if current != expected_generation {
            return Err(SlotError::Stale {
                slot_generation: current,
            });
        }
        Ok(())
    }

    /// Logically empty the chunk without touching the payload bytes.
    ///
    /// Every occupied slot goes through its occupied→free transition, so
    /// its generation advances and pre-clear references stay invalid
    /// across later reuse.
    pub(crate) fn clear(&self) {
        let mut bits = self.occupancy.swap(0, Ordering::AcqRel);
        while bits != 0 {
            let slot = bits.trailing_zeros() as usize;
            self.generations[slot].fetch_add(1, Ordering::AcqRel);
            bits &= bits - 1;
        }
        self.live.store(0, Ordering::Release);
        self.next.store(Link::NULL.raw(), Ordering::Release);
        self.status
            .store(ChunkStatus::Detached as u32, Ordering::Release);
    }

    /// Memory owned by this chunk's payload slab, in bytes.
    pub(crate) fn memory_bytes(&self) -> usize {
        self.slab.memory_bytes()
    }
}
