//! Contains the definition of [`Interner`] and [`InternedStr`], the canonical
//! string table shared by the whole compilation context.
//!
//! Every distinct piece of text submitted to an [`Interner`] is stored exactly
//! once, so two handles compare equal if and only if they point at the same
//! allocation. Each allocation carries a two byte prefix in front of the
//! user-visible content: byte 0 holds the garbage-collection mark for the
//! string and byte 1 is reserved metadata. Handles point past the prefix, the
//! content is NUL-terminated, and allocations are aligned to two bytes so the
//! low bit of every handle is zero and free for callers to use as a tag.

use std::{
    alloc::{self, Layout},
    borrow::Borrow,
    cell::RefCell,
    ffi::CStr,
    hash::{Hash, Hasher},
    ptr::NonNull,
};

use rustc_hash::FxHashSet;

/// A single byte epoch stamp used to decide whether an interned string is
/// still reachable during garbage collection.
///
/// The mark is the low 8 bits of a monotonically increasing collection
/// counter, so consecutive collections use distinct marks and a string that
/// was not re-stamped since the previous collection becomes sweepable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcMark(u8);

impl GcMark {
    /// Derives the mark for the given collection counter value.
    #[must_use]
    pub const fn of(counter: u64) -> Self { Self(counter as u8) }
}

// The canonical allocation backing the empty string. It lives outside the
// intern table so it is never swept and its mark byte is never written.
#[repr(align(2))]
struct EmptyAllocation([u8; 3]);

static EMPTY: EmptyAllocation = EmptyAllocation([0, RESERVED_BYTE, 0]);

const RESERVED_BYTE: u8 = 0x02;

/// A canonical handle for a piece of text owned by an [`Interner`].
///
/// Handles are cheap to copy, compare and hash by pointer identity, and stay
/// valid until the interner collects them. The pointed-to content is
/// NUL-terminated, so the handle doubles as a C string.
#[derive(Clone, Copy)]
pub struct InternedStr {
    // points at the first content byte, two bytes past the allocation start
    ptr: NonNull<u8>,
}

impl InternedStr {
    /// Returns the handle for the empty string.
    ///
    /// The empty string is canonical per process rather than per interner and
    /// is never collected.
    #[must_use]
    pub fn empty() -> Self {
        // SAFETY: the static allocation is never deallocated and its third
        // byte is the NUL terminator of an empty content region.
        Self {
            ptr: unsafe {
                NonNull::new_unchecked(EMPTY.0.as_ptr().add(2).cast_mut())
            },
        }
    }

    /// Returns the interned text.
    ///
    /// The returned slice borrows the interner-owned allocation; it remains
    /// valid until a garbage collection that sweeps this handle.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // SAFETY: every allocation is NUL-terminated and was copied from a
        // valid `&str`, so the bytes up to the terminator are UTF-8.
        unsafe {
            let bytes = CStr::from_ptr(self.ptr.as_ptr().cast()).to_bytes();
            std::str::from_utf8_unchecked(bytes)
        }
    }

    /// Returns the raw, even-aligned content pointer.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 { self.ptr.as_ptr() }

    /// Whether this handle refers to the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        // SAFETY: the first content byte is always readable; for the empty
        // string it is the NUL terminator.
        unsafe { self.ptr.as_ptr().read() == 0 }
    }

    fn gc_mark(&self) -> GcMark {
        debug_assert!(!self.is_static_empty());
        // SAFETY: non-empty handles point two bytes into a live allocation
        // whose first byte is the mark.
        GcMark(unsafe { self.ptr.as_ptr().sub(2).read() })
    }

    fn set_gc_mark(&self, mark: GcMark) {
        debug_assert!(!self.is_static_empty());
        // SAFETY: as in `gc_mark`; the mark byte is only ever written while
        // the owning interner is borrowed mutably.
        unsafe { self.ptr.as_ptr().sub(2).write(mark.0) }
    }

    fn is_static_empty(&self) -> bool {
        std::ptr::eq(self.ptr.as_ptr(), EMPTY.0.as_ptr().wrapping_add(2))
    }
}

impl Default for InternedStr {
    fn default() -> Self { Self::empty() }
}

impl PartialEq for InternedStr {
    fn eq(&self, other: &Self) -> bool { self.ptr == other.ptr }
}

impl Eq for InternedStr {}

impl Hash for InternedStr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.ptr.as_ptr() as usize).hash(state);
    }
}

impl std::fmt::Debug for InternedStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InternedStr({:?})", self.as_str())
    }
}

impl std::fmt::Display for InternedStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// An intern table entry. Unlike `InternedStr` itself, entries hash and
// compare by content so the table can be probed with a borrowed `&str`.
struct Entry(InternedStr);

impl Borrow<str> for Entry {
    fn borrow(&self) -> &str { self.0.as_str() }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool { self.0.as_str() == other.0.as_str() }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.as_str().hash(state) }
}

/// The context-wide table mapping raw text to canonical [`InternedStr`]
/// handles.
///
/// The interner does not track revisions itself; the owning context passes
/// the current [`GcMark`] (and whether a collection has been announced) into
/// [`unique`](Interner::unique), and triggers sweeps through
/// [`collect_unreachable`](Interner::collect_unreachable).
#[derive(Default)]
pub struct Interner {
    table: RefCell<FxHashSet<Entry>>,
}

impl Interner {
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Returns the canonical handle for `text`, allocating it on first use.
    ///
    /// Fresh allocations are stamped with `mark`. When `refresh` is set (the
    /// context is in a revision that announced a collection), a lookup hit
    /// re-stamps the existing allocation so it survives the coming sweep.
    pub fn unique(&self, text: &str, mark: GcMark, refresh: bool) -> InternedStr {
        debug_assert!(
            !text.contains('\0'),
            "interned strings are NUL-terminated and cannot contain NUL bytes"
        );

        if text.is_empty() {
            return InternedStr::empty();
        }

        let mut table = self.table.borrow_mut();
        if let Some(entry) = table.get(text) {
            let handle = entry.0;
            if refresh {
                handle.set_gc_mark(mark);
            }
            return handle;
        }

        let handle = allocate(text, mark);
        table.insert(Entry(handle));
        handle
    }

    /// Sweeps every string whose mark byte differs from `mark`, freeing the
    /// backing allocations and evicting the table entries.
    ///
    /// The caller is responsible for only invoking this outside of any query
    /// and in the revision that announced the collection; handles to swept
    /// strings become dangling.
    pub fn collect_unreachable(&self, mark: GcMark) {
        let mut table = self.table.borrow_mut();

        let previous = std::mem::take(&mut *table);
        let mut unreachable = Vec::new();
        for entry in previous {
            if entry.0.gc_mark() == mark {
                table.insert(entry);
            } else {
                unreachable.push(entry.0);
            }
        }

        for handle in unreachable {
            // SAFETY: the handle was just removed from the table, so no new
            // lookup can return it.
            unsafe { deallocate(handle) }
        }
    }

    /// Number of strings currently in the table. The empty string lives
    /// outside the table and is not counted.
    #[must_use]
    pub fn len(&self) -> usize { self.table.borrow().len() }

    /// Whether the table holds no strings.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.table.borrow().is_empty() }

    /// Whether `text` is currently interned.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        !text.is_empty() && self.table.borrow().contains(text)
    }
}

impl Drop for Interner {
    fn drop(&mut self) {
        for entry in self.table.get_mut().drain() {
            // SAFETY: the interner owns every allocation in its table and is
            // going away; no further lookups are possible.
            unsafe { deallocate(entry.0) }
        }
    }
}

impl std::fmt::Debug for Interner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interner").field("len", &self.len()).finish()
    }
}

fn layout_for(content_len: usize) -> Layout {
    // two prefix bytes, the content, and the NUL terminator; the alignment
    // keeps the low bit of the user-visible pointer clear
    Layout::from_size_align(content_len + 3, 2)
        .expect("interned string too large")
}

fn allocate(text: &str, mark: GcMark) -> InternedStr {
    let layout = layout_for(text.len());

    // SAFETY: the layout has non-zero size; the writes stay within the
    // allocation (2 prefix bytes + content + NUL = layout size).
    unsafe {
        let buf = alloc::alloc(layout);
        if buf.is_null() {
            alloc::handle_alloc_error(layout);
        }
        buf.write(mark.0);
        buf.add(1).write(RESERVED_BYTE);
        std::ptr::copy_nonoverlapping(text.as_ptr(), buf.add(2), text.len());
        buf.add(2 + text.len()).write(0);

        let content = buf.add(2);
        debug_assert_eq!(content as usize & 1, 0);
        InternedStr { ptr: NonNull::new_unchecked(content) }
    }
}

// SAFETY: `handle` must come from `allocate` and must not be used afterwards.
unsafe fn deallocate(handle: InternedStr) {
    let layout = layout_for(handle.as_str().len());
    alloc::dealloc(handle.ptr.as_ptr().sub(2), layout);
}
