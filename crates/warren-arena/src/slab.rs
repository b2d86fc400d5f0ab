//! Raw slot storage.
//!
//! The one module in this crate that owns memory through the raw
//! allocator. A [`SlotSlab`] is a single aligned allocation holding
//! [`SLOT_COUNT`] payload slots of one fixed stride. It hands out raw
//! slot pointers and nothing else; occupancy, generations and typing are
//! the chunk's problem.
//!
//! # Invariants
//!
//! - `base` points to `stride * SLOT_COUNT` bytes aligned to `align`
//!   (or is a dangling pointer still aligned to `align` when
//!   `stride == 0`, i.e. zero-sized payloads).
//! - The allocation lives until the slab is dropped; slot pointers handed
//!   out earlier remain valid for the slab's lifetime.
//! - The slab never reads or writes the memory itself, so `Send`/`Sync`
//!   are inherited from the payload discipline enforced above it.

#![allow(unsafe_code)]

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

use crate::chunk::SLOT_COUNT;

/// Fixed-capacity raw buffer of `SLOT_COUNT` same-stride payload slots.
pub(crate) struct SlotSlab {
    base: NonNull<u8>,
    stride: usize,
    /// `None` for zero-sized payloads (nothing was allocated).
    layout: Option<Layout>,
}

impl SlotSlab {
    /// Allocate a zeroed slab for payloads of the given size and alignment.
    ///
    /// Allocation failure is fatal (`handle_alloc_error`), matching the
    /// rest of the crate's growth paths which go through `Vec`.
    pub(crate) fn new(stride: usize, align: usize) -> Self {
        if stride == 0 {
            // Zero-sized payloads are still written and referenced through
            // the base pointer, so it must carry the payload's alignment;
            // `NonNull::dangling::<u8>()` (address 1) would make access to
            // an over-aligned ZST a misaligned access.
            let base = NonNull::new(std::ptr::without_provenance_mut(align.max(1)))
                .expect("alignment is nonzero");
            return Self {
                base,
                stride: 0,
                layout: None,
            };
        }
        // stride is a payload's size_of, so stride * SLOT_COUNT rounded to
        // align is a valid layout for an array of SLOT_COUNT payloads.
        let layout = Layout::from_size_align(stride * SLOT_COUNT, align)
            .expect("slot stride and alignment come from size_of/align_of");
        // SAFETY: layout has non-zero size (stride > 0).
        let raw = unsafe { alloc_zeroed(layout) };
        let Some(base) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };
        Self {
            base,
            stride,
            layout: Some(layout),
        }
    }

    /// Payload stride in bytes.
    pub(crate) fn stride(&self) -> usize {
        self.stride
    }

    /// Size of the backing allocation in bytes.
    pub(crate) fn memory_bytes(&self) -> usize {
        self.layout.map_or(0, |l| l.size())
    }

    /// Raw pointer to the given slot's payload bytes.
    ///
    /// The pointer is valid for `stride` bytes for the slab's lifetime.
    /// Callers are responsible for typing, initialisation tracking and
    /// aliasing; see `Chunk`'s payload lock.
    pub(crate) fn slot_ptr(&self, slot: usize) -> *mut u8 {
        debug_assert!(slot < SLOT_COUNT);
        if self.stride == 0 {
            return self.base.as_ptr();
        }
        // SAFETY: slot < SLOT_COUNT, so the offset stays inside the
        // stride * SLOT_COUNT allocation.
        unsafe { self.base.as_ptr().add(slot * self.stride) }
    }
}

impl Drop for SlotSlab {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            // SAFETY: base was returned by alloc_zeroed with this layout.
            unsafe { dealloc(self.base.as_ptr(), layout) };
        }
    }
}

// SAFETY: the slab itself only stores a pointer and never touches the
// pointee; cross-thread access to slot contents is serialised by the
// owning chunk's payload lock.
unsafe impl Send for SlotSlab {}
unsafe impl Sync for SlotSlab {}
