//! Tagged links for the global active list.
//!
//! A [`Link`] is a chunk handle plus one tag bit. The tag marks a chunk
//! whose `next` field is mid-relink (being pushed onto or unlinked from
//! the active list); detach walks must not splice across a transitional
//! link. Handles keep bit 31 clear (see `warren-core`'s layout), which is
//! what frees the bit for the tag.
//!
//! This replaces the classic negated-pointer convention with an explicit
//! tag: same single-word CAS, no sign arithmetic.

use warren_core::Handle;

const TRANSITIONAL_BIT: u32 = 1 << 31;

/// One word of the active list: a handle, optionally tagged transitional.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Link(u32);

impl Link {
    /// The null link (end of list). Never tagged.
    pub(crate) const NULL: Link = Link(0);

    /// An untagged link to the given handle (or null).
    pub(crate) fn plain(handle: Handle) -> Link {
        Link(handle.raw())
    }

    /// A transitional (mid-relink) link to the given handle (or null).
    pub(crate) fn transitional(handle: Handle) -> Link {
        Link(handle.raw() | TRANSITIONAL_BIT)
    }

    /// Rebuild a link from its raw word.
    pub(crate) fn from_raw(raw: u32) -> Link {
        Link(raw)
    }

    /// The raw word stored in atomics.
    pub(crate) fn raw(self) -> u32 {
        self.0
    }

    /// Whether the tag bit is set.
    pub(crate) fn is_transitional(self) -> bool {
        self.0 & TRANSITIONAL_BIT != 0
    }

    /// The handle this link points at, tag stripped.
    pub(crate) fn handle(self) -> Handle {
        Handle::from_raw(self.0 & !TRANSITIONAL_BIT)
    }

    /// Whether this link points nowhere (tag ignored).
    pub(crate) fn is_null(self) -> bool {
        self.handle().is_null()
    }
}
