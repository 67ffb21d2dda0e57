//! Implements the compilation-wide context: a program database that memoizes
//! the results of pure queries, tracks the dependencies between them and
//! recomputes only what changed between revisions.
//!
//! Queries are functions written in a stylized manner against the
//! [`Context`]. A query names itself with a [`Key`] type (the argument
//! tuple) and computes a [`Value`] in an [`Executor`] body. When a query is
//! invoked, the engine checks whether the saved result is still valid (every
//! result remembers which other results it consumed and at which revision it
//! last changed) and only falls back to the body when some transitive input
//! changed. Results the body consults along the way are recorded as
//! dependencies automatically, as are the diagnostics they produced.
//!
//! ``` ignore
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! struct LineCount(InternedStr);
//!
//! impl Key for LineCount {
//!     type Value = usize;
//! }
//!
//! struct LineCountExecutor;
//!
//! impl Executor<LineCount> for LineCountExecutor {
//!     fn execute(&self, context: &Context, key: LineCount) -> usize {
//!         context.file_text(key.0).lines().count()
//!     }
//! }
//!
//! let mut context = Context::new();
//! context.register_executor(Arc::new(LineCountExecutor));
//! let path = context.unique_string("demo.rill");
//! context.set_file_text(path, "var x = 1;\n");
//! context.advance_to_next_revision(false);
//! assert_eq!(context.query(&LineCount(path)), 1);
//! ```
//!
//! External inputs (file contents, the module-name-to-path mapping) are
//! results without bodies, overwritten through setters between revisions.
//! The context also owns the canonical string table; queries intern text
//! through [`Context::unique_string`] and the mark-and-sweep collection of
//! both strings and displaced results runs through
//! [`Context::collect_garbage`].

use std::{cell::RefCell, sync::Arc};

use rillc_intern::{GcMark, InternedStr, Interner};

pub use crate::{
    database::ResultStamps,
    executor::{Executor, Registry},
    key::{DynamicKey, Key, KeyBox, Value},
};

mod database;
mod executor;
mod key;

/// A point on the semantic clock of a [`Context`].
///
/// Every external input mutation advances the revision; every saved result
/// records the revisions at which it was computed, validated and last
/// changed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
)]
pub struct Revision(u64);

impl Revision {
    /// Returns the revision number.
    #[must_use]
    pub const fn number(self) -> u64 { self.0 }

    const fn next(self) -> Self { Self(self.0 + 1) }
}

/// The compilation-wide context, also known as the program database.
///
/// The context owns the canonical string table, every query map and every
/// saved result. It is an explicit value threaded through all queries and is
/// deliberately not thread-safe: all query calls, setter calls, revision
/// advances and collections happen on one thread.
pub struct Context {
    interner: Interner,
    registry: Registry,
    database: RefCell<database::Database>,

    revision: Revision,
    last_prepare_to_gc: Revision,
    gc_counter: u64,
}

impl Default for Context {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("revision", &self.revision)
            .field("interner", &self.interner)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Creates a fresh context with no inputs and no saved results.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
            registry: Registry::default(),
            database: RefCell::default(),
            revision: Revision(1),
            last_prepare_to_gc: Revision(0),
            gc_counter: 1,
        }
    }

    /// The current revision.
    #[must_use]
    pub fn revision(&self) -> Revision { self.revision }

    /// Returns the canonical handle for `text`, interning it on first use.
    ///
    /// During a revision that announced a collection, re-interning an
    /// existing string refreshes its mark so it survives the sweep; query
    /// bodies that want to retain a string across a collection re-intern it
    /// while they recompute.
    #[must_use]
    pub fn unique_string(&self, text: &str) -> InternedStr {
        let refresh = self.revision == self.last_prepare_to_gc;
        self.interner.unique(text, self.gc_mark(), refresh)
    }

    /// Number of strings currently interned.
    #[must_use]
    pub fn interned_string_count(&self) -> usize { self.interner.len() }

    /// Increments the revision counter. After this call the setters can be
    /// used to provide the inputs of the new revision.
    ///
    /// When `prepare_to_gc` is set, the new revision is remembered as the
    /// collection revision: strings interned (or re-interned) while its
    /// queries run are marked live, and [`collect_garbage`] frees the rest.
    ///
    /// [`collect_garbage`]: Self::collect_garbage
    pub fn advance_to_next_revision(&mut self, prepare_to_gc: bool) {
        self.revision = self.revision.next();
        if prepare_to_gc {
            self.last_prepare_to_gc = self.revision;
            self.gc_counter += 1;
        }
        log::debug!(
            "advanced to revision {} (prepare to collect: {prepare_to_gc})",
            self.revision
        );
    }

    /// Runs garbage collection.
    ///
    /// This has no effect unless no query is executing and the current
    /// revision is the one most recently announced through
    /// [`advance_to_next_revision`] with `prepare_to_gc` set. When it runs,
    /// it frees the result values displaced in earlier revisions and sweeps
    /// every interned string whose mark was not refreshed.
    ///
    /// [`advance_to_next_revision`]: Self::advance_to_next_revision
    pub fn collect_garbage(&mut self) {
        if !self.no_active_queries() || self.revision != self.last_prepare_to_gc
        {
            return;
        }

        let before = self.interner.len();
        self.discard_displaced_before(self.revision);
        self.interner.collect_unreachable(self.gc_mark());
        log::debug!(
            "collected garbage at revision {}: {} of {before} strings swept",
            self.revision,
            before - self.interner.len()
        );
    }

    fn gc_mark(&self) -> GcMark { GcMark::of(self.gc_counter) }
}

// The built-in input queries: file contents and the module-name-to-path
// mapping, both populated by setters between revisions.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileText(InternedStr);

impl Key for FileText {
    type Value = Arc<str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FilePathForModuleName(InternedStr);

impl Key for FilePathForModuleName {
    type Value = InternedStr;
}

impl Context {
    /// Sets the contents of the file at `path` for the current revision.
    /// Returns whether the contents actually changed.
    pub fn set_file_text(
        &mut self,
        path: InternedStr,
        text: impl Into<Arc<str>>,
    ) -> bool {
        self.set_input(&FileText(path), text.into())
    }

    /// The contents of the file at `path`, as last provided through
    /// [`set_file_text`](Self::set_file_text).
    ///
    /// # Panics
    ///
    /// Panics when no contents were ever set for `path`.
    #[must_use]
    pub fn file_text(&self, path: InternedStr) -> Arc<str> {
        self.saved_query(&FileText(path))
    }

    /// Sets the file path for the given top-level module name. Suitable to
    /// call from a parsing query. Returns whether the mapping changed.
    pub fn set_file_path_for_module_name(
        &mut self,
        module_name: InternedStr,
        path: InternedStr,
    ) -> bool {
        self.set_input(&FilePathForModuleName(module_name), path)
    }

    /// The file path recorded for the given top-level module name.
    ///
    /// # Panics
    ///
    /// Panics when [`set_file_path_for_module_name`] was never called for
    /// `module_name`; this query has no compute path of its own.
    ///
    /// [`set_file_path_for_module_name`]: Self::set_file_path_for_module_name
    #[must_use]
    pub fn file_path_for_module_name(
        &self,
        module_name: InternedStr,
    ) -> InternedStr {
        self.saved_query(&FilePathForModuleName(module_name))
    }
}
