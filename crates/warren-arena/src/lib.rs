//! Thread-partitioned generational slot arena.
//!
//! Objects live in fixed 32-slot chunks; each worker thread owns a
//! growable set of chunks, and a single lock-free list threads together
//! every chunk that currently holds at least one live object. Callers
//! keep [`EntityRef`]s — packed `(handle, slot, generation)` triples —
//! instead of pointers, and every dereference or free validates the
//! generation, so use of a freed slot fails cleanly.
//!
//! # Architecture
//!
//! ```text
//! Arena (facade)
//! ├── ChunkSet × worker_threads (per-thread growable chunk arrays)
//! │   └── Chunk × n (32 slots: occupancy mask, generations, payload slab)
//! ├── ActiveList (lock-free list of non-empty chunks, tagged links)
//! └── ArenaConfig
//! ```
//!
//! The active list is the only cross-thread serialisation point and is
//! touched only on a chunk's empty↔non-empty transitions, never on
//! ordinary slot alloc/free (those are CAS loops on the owning chunk's
//! own words).
//!
//! # Safety
//!
//! This crate contains bounded `unsafe`: the raw payload slab, the chunk
//! set's published index array, the typed payload accessors (validated
//! under a per-chunk payload lock), and the facade's `&mut`-gated
//! accessor. Each site documents the invariant it relies on; everything
//! above those seams is safe code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod iter;

mod active;
mod chunk;
mod chunkset;
mod link;
mod slab;
mod spin;

// Public re-exports for the primary API surface.
pub use arena::{Arena, Payload};
pub use chunk::SLOT_COUNT;
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use iter::{ActiveIter, ThreadIter};
pub use warren_core::{EntityRef, Handle, MAX_CHUNKS_PER_THREAD, MAX_WORKER_THREADS};
