//! Contains the program database proper: the result cells, the active-query
//! stack, the can-reuse decision and the merge/stamp bookkeeping that every
//! query call goes through.

use rillc_arena::{Arena, Id};
use rillc_base::diagnostic::Diagnostic;
use rustc_hash::FxHashMap;

use crate::{
    key::{DynamicKey, Key, KeyBox, Value},
    Context, Revision,
};

pub(crate) type CellId = Id<Cell>;

/// The storage for one memoized result: the value, the results it consumed
/// while it was last computed, the diagnostics it produced, and the revision
/// stamps driving reuse decisions.
pub(crate) struct Cell {
    value: Box<dyn std::any::Any>,

    /// Result cells consulted during the last computation, in call order.
    dependencies: Vec<CellId>,

    /// Diagnostics noted during the last computation, including those
    /// re-emitted by consulted dependencies.
    errors: Vec<Diagnostic>,

    /// Revision at which the value last actually changed.
    changed_at: Revision,

    /// Revision at which the value was last computed by running the body.
    computed_at: Revision,

    /// Revision at which the value was last validated, by computation or by
    /// a successful reuse check.
    checked_at: Revision,

    /// Whether this cell is an external input, owned by a setter rather than
    /// an executor.
    is_input: bool,
}

/// One entry of the active-query stack: the query being executed and the
/// dependencies and diagnostics observed so far.
struct Frame {
    key: KeyBox,
    dependencies: Vec<CellId>,
    errors: Vec<Diagnostic>,
}

/// A value displaced from a cell by a changed merge. It stays allocated until
/// garbage collection so references handed out before the change remain
/// usable for the rest of the revision.
struct Displaced {
    displaced_at: Revision,
    #[allow(dead_code)]
    value: Box<dyn std::any::Any>,
}

#[derive(Default)]
pub(crate) struct Database {
    cells_by_key: FxHashMap<KeyBox, CellId>,
    cells: Arena<Cell>,
    frames: Vec<Frame>,
    displaced: Vec<Displaced>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("cells", &self.cells.len())
            .field("active_queries", &self.frames.len())
            .finish_non_exhaustive()
    }
}

/// The revision stamps of one saved result, exposed for inspection.
///
/// The engine maintains `changed_at <= computed_at <= checked_at`, and all
/// three never exceed the context's current revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultStamps {
    /// Revision at which the value last changed.
    pub changed_at: Revision,

    /// Revision at which the body last ran (or the setter last stored).
    pub computed_at: Revision,

    /// Revision at which the result was last checked and found reusable.
    pub checked_at: Revision,
}

impl Database {
    /// Decides whether the saved result in `id` is still valid at `revision`
    /// without running its body.
    ///
    /// A result is reusable when it was already validated this revision, or
    /// when every dependency is itself reusable and none of them changed
    /// after this result was computed. Input cells only change through
    /// setters, which stamp them eagerly, so a present input is always
    /// reusable. A derived result with no dependencies is only trusted
    /// within the revision that computed it.
    ///
    /// A positive answer is memoized in `checked_at` so diamond-shaped
    /// dependency graphs are traversed once per revision.
    fn can_reuse(&mut self, id: CellId, revision: Revision) -> bool {
        let cell = &self.cells[id];
        if cell.computed_at == revision || cell.checked_at == revision {
            return true;
        }

        let reusable = if cell.is_input {
            true
        } else if cell.dependencies.is_empty() {
            cell.computed_at == revision
        } else {
            let computed_at = cell.computed_at;
            let dependencies = cell.dependencies.clone();

            let mut all_fresh = true;
            for dependency in dependencies {
                if self.cells[dependency].changed_at > computed_at
                    || !self.can_reuse(dependency, revision)
                {
                    all_fresh = false;
                    break;
                }
            }
            all_fresh
        };

        if reusable {
            self.cells[id].checked_at = revision;
        }
        reusable
    }

    /// Records `id` as a dependency of the innermost executing query, if
    /// any, and re-emits the cell's diagnostics into that query's frame.
    fn record_dependency(&mut self, id: CellId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.dependencies.push(id);
            frame.errors.extend_from_slice(&self.cells[id].errors);
        }
    }

    fn lookup(&self, key: &KeyBox) -> Option<CellId> {
        self.cells_by_key.get(key).copied()
    }
}

impl Context {
    /// Invokes the `K` query for `key`, reusing the saved result when nothing
    /// it depends on has changed and running the registered executor
    /// otherwise.
    ///
    /// # Panics
    ///
    /// Panics when no executor is registered for `K`, or when the call forms
    /// a cycle with an invocation already on the active-query stack.
    pub fn query<K: Key>(&self, key: &K) -> K::Value {
        if let Some(saved) = self.begin(key) {
            return saved;
        }

        let executor = self.executor::<K>().unwrap_or_else(|| {
            panic!(
                "no executor registered for query `{}`",
                std::any::type_name::<K>()
            )
        });

        let candidate = executor.execute(self, key.clone());

        self.end(key, candidate)
    }

    /// Queries a result that must have been stored by a setter beforehand.
    ///
    /// Unlike [`query`](Self::query) there is no compute path: the saved
    /// value is the only possible answer.
    ///
    /// # Panics
    ///
    /// Panics when no setter has populated a result for `key`.
    pub fn saved_query<K: Key>(&self, key: &K) -> K::Value {
        let revision = self.revision;
        let mut database = self.database.borrow_mut();
        let database = &mut *database;

        let key_box = key.boxed_clone();
        let id = database.lookup(&key_box).unwrap_or_else(|| {
            panic!(
                "query `{}` must be populated by its setter before it is \
                 called",
                key_box.query_name()
            )
        });

        let reusable = database.can_reuse(id, revision);
        debug_assert!(reusable, "saved-only results are always reusable");

        database.record_dependency(id);
        downcast_value::<K>(&database.cells[id]).clone()
    }

    /// Stores the result of an input query, bypassing any executor.
    ///
    /// Inputs may only be set while no query is executing; setting one
    /// mid-query would corrupt the dependency records of the running
    /// queries. Returns whether the stored value actually changed.
    pub fn set_input<K: Key>(&mut self, key: &K, value: K::Value) -> bool {
        let revision = self.revision;
        let database = self.database.get_mut();
        assert!(
            database.frames.is_empty(),
            "inputs may only be set while no query is executing"
        );

        let key_box = key.boxed_clone();
        match database.lookup(&key_box) {
            Some(id) => {
                let cell = &mut database.cells[id];
                let keep = downcast_value_mut::<K>(cell);
                let mut candidate = value;
                let changed = Value::merge(keep, &mut candidate);
                cell.computed_at = revision;
                cell.checked_at = revision;
                cell.is_input = true;
                if changed {
                    cell.changed_at = revision;
                    database.displaced.push(Displaced {
                        displaced_at: revision,
                        value: Box::new(candidate),
                    });
                }
                changed
            }
            None => {
                let id = database.cells.insert(Cell {
                    value: Box::new(value),
                    dependencies: Vec::new(),
                    errors: Vec::new(),
                    changed_at: revision,
                    computed_at: revision,
                    checked_at: revision,
                    is_input: true,
                });
                database.cells_by_key.insert(key_box, id);
                true
            }
        }
    }

    /// Notes a diagnostic against the innermost executing query.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a query body.
    pub fn note_error(&self, diagnostic: Diagnostic) {
        let mut database = self.database.borrow_mut();
        let frame = database
            .frames
            .last_mut()
            .expect("diagnostics may only be noted inside a query body");
        frame.errors.push(diagnostic);
    }

    /// Returns the diagnostics stored on the saved result for `key`,
    /// including the transitive diagnostics of everything it consulted.
    #[must_use]
    pub fn saved_errors<K: Key>(&self, key: &K) -> Option<Vec<Diagnostic>> {
        let database = self.database.borrow();
        let id = database.lookup(&key.boxed_clone())?;
        Some(database.cells[id].errors.clone())
    }

    /// Returns the revision stamps of the saved result for `key`.
    #[must_use]
    pub fn saved_stamps<K: Key>(&self, key: &K) -> Option<ResultStamps> {
        let database = self.database.borrow();
        let id = database.lookup(&key.boxed_clone())?;
        let cell = &database.cells[id];
        Some(ResultStamps {
            changed_at: cell.changed_at,
            computed_at: cell.computed_at,
            checked_at: cell.checked_at,
        })
    }

    /// The first half of a query call: reuse the saved result if it is still
    /// valid, otherwise push a frame for the body about to run.
    fn begin<K: Key>(&self, key: &K) -> Option<K::Value> {
        let revision = self.revision;
        let mut database = self.database.borrow_mut();
        let database = &mut *database;

        let key_box = key.boxed_clone();

        if let Some(id) = database.lookup(&key_box) {
            if database.can_reuse(id, revision) {
                log::trace!(
                    "query `{}` reusing saved result",
                    key_box.query_name()
                );
                database.record_dependency(id);
                return Some(downcast_value::<K>(&database.cells[id]).clone());
            }
        }

        if let Some(frame) =
            database.frames.iter().find(|frame| frame.key.dyn_eq(key))
        {
            let chain = database
                .frames
                .iter()
                .map(|frame| frame.key.query_name())
                .collect::<Vec<_>>()
                .join(" -> ");
            panic!(
                "cyclic query invocation: `{}` called again while still \
                 executing (active queries: {chain})",
                frame.key.query_name()
            );
        }

        log::trace!("query `{}` computing", key_box.query_name());
        database.frames.push(Frame {
            key: key_box,
            dependencies: Vec::new(),
            errors: Vec::new(),
        });

        None
    }

    /// The second half of a query call: merge the candidate into the saved
    /// cell, stamp it, pop the frame into it and surface it to the enclosing
    /// query.
    fn end<K: Key>(&self, key: &K, candidate: K::Value) -> K::Value {
        let revision = self.revision;
        let mut database = self.database.borrow_mut();
        let database = &mut *database;

        let frame =
            database.frames.pop().expect("query ended without beginning");
        debug_assert!(frame.key.dyn_eq(key), "mismatched query frame");

        let id = match database.lookup(&frame.key) {
            Some(id) => {
                let cell = &mut database.cells[id];
                let keep = downcast_value_mut::<K>(cell);
                let mut candidate = candidate;
                if Value::merge(keep, &mut candidate) {
                    cell.changed_at = revision;
                    database.displaced.push(Displaced {
                        displaced_at: revision,
                        value: Box::new(candidate),
                    });
                }
                cell.computed_at = revision;
                cell.checked_at = revision;
                cell.dependencies = frame.dependencies;
                cell.errors = frame.errors;
                id
            }
            None => {
                let id = database.cells.insert(Cell {
                    value: Box::new(candidate),
                    dependencies: frame.dependencies,
                    errors: frame.errors,
                    changed_at: revision,
                    computed_at: revision,
                    checked_at: revision,
                    is_input: false,
                });
                database.cells_by_key.insert(frame.key, id);
                id
            }
        };

        database.record_dependency(id);
        downcast_value::<K>(&database.cells[id]).clone()
    }

    /// Whether any query is currently executing.
    #[must_use]
    pub fn in_query(&self) -> bool {
        !self.database.borrow().frames.is_empty()
    }

    pub(crate) fn discard_displaced_before(&mut self, revision: Revision) {
        self.database
            .get_mut()
            .displaced
            .retain(|displaced| displaced.displaced_at >= revision);
    }

    pub(crate) fn no_active_queries(&mut self) -> bool {
        self.database.get_mut().frames.is_empty()
    }
}

fn downcast_value<K: Key>(cell: &Cell) -> &K::Value {
    cell.value
        .downcast_ref::<K::Value>()
        .expect("saved result stored under the wrong value type")
}

fn downcast_value_mut<K: Key>(cell: &mut Cell) -> &mut K::Value {
    cell.value
        .downcast_mut::<K::Value>()
        .expect("saved result stored under the wrong value type")
}
