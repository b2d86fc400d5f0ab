//! Core identifier types for the Warren slot arena.
//!
//! This crate holds the types that cross the boundary between the arena
//! and the data structures built on top of it: the packed [`Handle`] that
//! names a chunk, and the [`EntityRef`] triple that names a single slot
//! inside a chunk together with the generation it was created at.
//!
//! Higher layers store `EntityRef`s instead of pointers; the arena crate
//! resolves and validates them.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod entity;
pub mod handle;

pub use entity::EntityRef;
pub use handle::{Handle, MAX_CHUNKS_PER_THREAD, MAX_WORKER_THREADS};
