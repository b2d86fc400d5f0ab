//! Entity references.
//!
//! An [`EntityRef`] is what callers keep instead of a pointer: the chunk
//! [`Handle`], the slot index within the chunk, and the generation the
//! slot had when the entity was created. The generation lets the arena
//! detect use of a reference whose slot has since been freed or reused.

use std::fmt;

use crate::handle::Handle;

/// Reference to a single live (or once-live) entity slot.
///
/// The triple is the arena's equivalent of a weak reference: dereference
/// and free operations validate the generation before touching the slot,
/// so a stale `EntityRef` fails cleanly instead of aliasing the slot's
/// current occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct EntityRef {
    /// The chunk holding the slot.
    pub handle: Handle,
    /// Slot index within the chunk (0..32).
    pub slot: u8,
    /// Slot generation at creation time.
    pub generation: u32,
}

impl EntityRef {
    /// Create a reference from its parts.
    pub fn new(handle: Handle, slot: u8, generation: u32) -> Self {
        Self {
            handle,
            slot,
            generation,
        }
    }

    /// A reference that never validates: null handle, generation 0.
    pub const NULL: EntityRef = EntityRef {
        handle: Handle::NULL,
        slot: 0,
        generation: 0,
    };

    /// Whether this is the null reference.
    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        EntityRef::NULL
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityRef({}, slot={}, gen={})",
            self.handle, self.slot, self.generation
        )
    }
}
