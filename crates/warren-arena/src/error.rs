//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use warren_core::{EntityRef, Handle};

/// Errors that can occur during arena operations.
///
/// Transient conditions (a full chunk, a lost CAS race) are handled
/// internally and never surface here; every variant below is either a
/// caller mistake or resource exhaustion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The arena configuration failed validation at construction.
    InvalidConfig {
        /// Human-readable description of the violated constraint.
        reason: String,
    },
    /// A thread index at or beyond the configured worker-thread count.
    ThreadOutOfRange {
        /// The offending thread index.
        thread_index: usize,
        /// The configured worker-thread count.
        worker_threads: usize,
    },
    /// A reference whose coordinates do not name an existing slot
    /// (unknown chunk index, or slot index >= chunk capacity).
    OutOfBounds {
        /// The reference that failed resolution.
        entity: EntityRef,
    },
    /// The addressed slot is not occupied: either it was never allocated
    /// or it has already been freed (double free).
    VacantSlot {
        /// The chunk holding the slot.
        handle: Handle,
        /// The vacant slot index.
        slot: u8,
    },
    /// The slot is occupied but by a later occupant than the reference
    /// was created for: the reference is stale.
    StaleHandle {
        /// The generation carried by the reference.
        ref_generation: u32,
        /// The slot's current generation.
        slot_generation: u32,
    },
    /// A typed accessor was used with a payload type that does not match
    /// the chunk's payload type.
    TypeMismatch {
        /// Payload type the chunk was created for.
        expected: &'static str,
        /// Payload type the accessor asked for.
        found: &'static str,
    },
    /// The arena cannot grow further: the per-thread chunk index space
    /// encodable in a handle is exhausted.
    CapacityExceeded {
        /// Thread whose chunk set is full.
        thread_index: usize,
        /// Number of chunks already allocated for that thread.
        chunks: usize,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => {
                write!(f, "invalid arena config: {reason}")
            }
            Self::ThreadOutOfRange {
                thread_index,
                worker_threads,
            } => {
                write!(
                    f,
                    "thread index {thread_index} out of range ({worker_threads} worker threads)"
                )
            }
            Self::OutOfBounds { entity } => {
                write!(f, "reference out of bounds: {entity}")
            }
            Self::VacantSlot { handle, slot } => {
                write!(f, "slot {slot} of {handle} is vacant (double free?)")
            }
            Self::StaleHandle {
                ref_generation,
                slot_generation,
            } => {
                write!(
                    f,
                    "stale reference: generation {ref_generation}, slot is at {slot_generation}"
                )
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "payload type mismatch: chunk holds {expected}, asked for {found}")
            }
            Self::CapacityExceeded {
                thread_index,
                chunks,
            } => {
                write!(
                    f,
                    "chunk capacity exceeded for thread {thread_index} ({chunks} chunks)"
                )
            }
        }
    }
}

impl Error for ArenaError {}
