//! Contains the [`Builder`], which turns the top-level expressions produced
//! by a parser into a finished, identifier-addressed tree.
//!
//! The builder performs two steps. First, a file whose top level is not
//! entirely module declarations is wrapped in a single implicit module named
//! after the file. Second, every node is assigned an [`Id`]: declarations
//! extend the symbol path and open a fresh postorder numbering for the
//! declared symbol, everything else is numbered within the enclosing symbol
//! in postorder.

use std::{fmt::Write as _, sync::Arc};

use rillc_base::{diagnostic::Diagnostic, location::Location};
use rillc_intern::InternedStr;
use rillc_query::{Context, Value};
use rustc_hash::FxHashMap;

use crate::{
    id::Id,
    node::{Decl, Expr, Module, ModuleKind, Symbol, Visibility},
};

/// Accumulates the top-level expressions and diagnostics of one file and
/// produces a [`BuildResult`].
#[derive(Debug)]
pub struct Builder<'ctx> {
    context: &'ctx Context,
    file_path: InternedStr,
    inferred_module_name: InternedStr,
    top_level: Vec<Expr>,
    errors: Vec<Diagnostic>,
}

impl<'ctx> Builder<'ctx> {
    /// Creates a builder for the file at `file_path`. The name of the
    /// implicit module, should one be needed, is the file's basename with
    /// the extension stripped.
    #[must_use]
    pub fn new(context: &'ctx Context, file_path: &str) -> Self {
        let module_name = module_name_from_path(file_path);
        Self {
            context,
            file_path: context.unique_string(file_path),
            inferred_module_name: context.unique_string(module_name),
            top_level: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// The interned path of the file being built.
    #[must_use]
    pub fn file_path(&self) -> InternedStr { self.file_path }

    /// The module name inferred from the file path.
    #[must_use]
    pub fn inferred_module_name(&self) -> InternedStr {
        self.inferred_module_name
    }

    /// Appends a top-level expression.
    pub fn add_top_level(&mut self, expr: Expr) { self.top_level.push(expr); }

    /// Records a diagnostic raised while producing the tree.
    pub fn add_error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    /// Wraps the statements in an implicit module when needed, assigns
    /// identifiers and returns the finished result.
    #[must_use]
    pub fn finish(mut self) -> BuildResult {
        self.wrap_in_implicit_module_if_needed();

        let mut assigner = IdAssigner {
            context: self.context,
            path_components: Vec::new(),
            locations: Vec::new(),
        };

        let empty_path = InternedStr::empty();
        let mut counter = 0;
        let mut declared_here = FxHashMap::default();
        for expr in &mut self.top_level {
            assert!(
                expr.is_module_decl(),
                "top-level expressions must be module declarations after \
                 wrapping"
            );
            assigner.visit_expr(
                expr,
                empty_path,
                &mut counter,
                &mut declared_here,
            );
        }

        BuildResult {
            top_level: self.top_level.into_iter().map(Arc::new).collect(),
            errors: self.errors,
            locations: assigner.locations,
        }
    }

    // A file whose top level is entirely module declarations keeps its shape;
    // any loose statement forces the whole list into one implicit module.
    fn wrap_in_implicit_module_if_needed(&mut self) {
        let needs_wrap =
            self.top_level.iter().any(|expr| !expr.is_module_decl());
        if !needs_wrap {
            return;
        }

        let location = Location::whole_file(self.file_path);
        let body = std::mem::take(&mut self.top_level);
        let module = Module::new(
            location,
            self.inferred_module_name,
            Visibility::Default,
            ModuleKind::Implicit,
            body,
        );
        self.top_level
            .push(Expr::Decl(Decl::new(location, Symbol::Module(module))));
    }
}

fn module_name_from_path(path: &str) -> &str {
    let basename = path.rsplit('/').next().unwrap_or(path);
    basename.rsplit_once('.').map_or(basename, |(stem, _)| stem)
}

struct IdAssigner<'ctx> {
    context: &'ctx Context,
    path_components: Vec<(InternedStr, u32)>,
    locations: Vec<(Id, Location)>,
}

impl IdAssigner<'_> {
    fn visit_expr(
        &mut self,
        expr: &mut Expr,
        symbol_path: InternedStr,
        counter: &mut u32,
        declared_here: &mut FxHashMap<InternedStr, u32>,
    ) {
        // comments receive no identifier and do not advance the numbering
        if matches!(expr, Expr::Comment(_)) {
            return;
        }

        let first_child = *counter;

        // declarations do not contribute their subtree to the enclosing
        // symbol's numbering; the declared symbol is numbered on its own
        if !matches!(expr, Expr::Decl(_)) {
            for child in expr.children_mut() {
                self.visit_expr(child, symbol_path, counter, declared_here);
            }
        }

        let index = *counter;
        *counter += 1;

        let id = Id::new(symbol_path, index, index - first_child);
        expr.set_id(id);
        self.locations.push((id, expr.location()));

        if let Expr::Decl(decl) = expr {
            self.visit_declared_symbol(&mut decl.symbol, declared_here);
        }
    }

    fn visit_declared_symbol(
        &mut self,
        symbol: &mut Symbol,
        declared_here: &mut FxHashMap<InternedStr, u32>,
    ) {
        let name = symbol.name();
        let repeat = match declared_here.entry(name) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                *entry.get_mut() += 1;
                *entry.get()
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(0);
                0
            }
        };

        self.path_components.push((name, repeat));
        let extended_path =
            self.context.unique_string(&self.render_symbol_path());

        let mut fresh_counter = 0;
        let mut fresh_declared_here = FxHashMap::default();
        let first_child = fresh_counter;
        for child in symbol.children_mut() {
            self.visit_expr(
                child,
                extended_path,
                &mut fresh_counter,
                &mut fresh_declared_here,
            );
        }

        let index = fresh_counter;
        let id = Id::new(extended_path, index, index - first_child);
        symbol.set_id(id);
        self.locations.push((id, symbol.location()));

        self.path_components.pop();
    }

    fn render_symbol_path(&self) -> String {
        let mut path = String::new();
        for (position, (name, repeat)) in
            self.path_components.iter().enumerate()
        {
            if position > 0 {
                path.push('.');
            }
            path.push_str(name.as_str());
            if *repeat > 0 {
                let _ = write!(path, "#{repeat}");
            }
        }
        path
    }
}

/// The finished product of a [`Builder`]: the (possibly wrapped) top-level
/// expressions, the diagnostics raised while building, and the source
/// location of every identified node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// The top-level expressions. After wrapping these are always module
    /// declarations. They are shared so results of later queries can retain
    /// nodes across re-parses.
    pub top_level: Vec<Arc<Expr>>,

    /// Diagnostics raised while producing the tree.
    pub errors: Vec<Diagnostic>,

    /// The source location of every node that received an identifier.
    pub locations: Vec<(Id, Location)>,
}

impl Value for BuildResult {
    /// Merges a freshly built tree into the saved one position by position:
    /// a top-level node that is content-equal to the saved node keeps the
    /// saved pointer, so queries holding it continue to see the same
    /// allocation across revisions in which it did not change.
    fn merge(keep: &mut Self, candidate: &mut Self) -> bool {
        let mut changed = false;

        if keep.errors != candidate.errors {
            std::mem::swap(&mut keep.errors, &mut candidate.errors);
            changed = true;
        }
        if keep.locations != candidate.locations {
            std::mem::swap(&mut keep.locations, &mut candidate.locations);
            changed = true;
        }

        if keep.top_level.len() == candidate.top_level.len() {
            for (kept, fresh) in
                keep.top_level.iter_mut().zip(candidate.top_level.iter_mut())
            {
                if !Arc::ptr_eq(kept, fresh) && **kept != **fresh {
                    std::mem::swap(kept, fresh);
                    changed = true;
                }
            }
        } else {
            std::mem::swap(&mut keep.top_level, &mut candidate.top_level);
            changed = true;
        }

        changed
    }
}
