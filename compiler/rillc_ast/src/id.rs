//! Contains the definition of [`Id`], the stable identifier of an AST node.

use getset::CopyGetters;
use rillc_intern::InternedStr;
use rillc_query::Context;

/// A stable identifier for an AST node.
///
/// An identifier is the dotted path of the enclosing symbol (with `#N`
/// appended to the Nth repeat of a name within its parent symbol), the index
/// the node received in a postorder walk of that symbol's subtree, and the
/// number of descendants numbered before it within the same symbol. Within
/// one symbol the postorder indices of the non-comment nodes form a
/// contiguous range starting at zero.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, CopyGetters,
)]
#[get_copy = "pub"]
pub struct Id {
    /// The dotted path of the symbol this node is numbered within.
    symbol_path: InternedStr,

    /// The index assigned to the node in the postorder walk.
    post_order_index: u32,

    /// How many nodes in the same symbol are contained in this node's
    /// subtree.
    contained_ids: u32,
}

impl Id {
    /// Creates an identifier from its parts.
    #[must_use]
    pub fn new(
        symbol_path: InternedStr,
        post_order_index: u32,
        contained_ids: u32,
    ) -> Self {
        debug_assert!(contained_ids <= post_order_index);
        Self { symbol_path, post_order_index, contained_ids }
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol_path, self.post_order_index)
    }
}

/// Identifier-aware lookups on the compilation [`Context`].
pub trait ContextIdExt {
    /// The name of the top-level module containing the node with this
    /// identifier, or the empty string for identifiers without a symbol
    /// path.
    fn module_name_for_id(&self, id: Id) -> InternedStr;

    /// The path of the file containing the node with this identifier.
    ///
    /// # Panics
    ///
    /// Panics when no file path was recorded for the node's module through
    /// [`set_file_path_for_module_name`].
    ///
    /// [`set_file_path_for_module_name`]: Context::set_file_path_for_module_name
    fn file_path_for_id(&self, id: Id) -> InternedStr;
}

impl ContextIdExt for Context {
    fn module_name_for_id(&self, id: Id) -> InternedStr {
        let path = id.symbol_path();
        let text = path.as_str();

        match text.find('.') {
            // the whole path is the module name; keep the existing handle
            None => path,
            Some(dot) => self.unique_string(&text[..dot]),
        }
    }

    fn file_path_for_id(&self, id: Id) -> InternedStr {
        self.file_path_for_module_name(self.module_name_for_id(id))
    }
}
