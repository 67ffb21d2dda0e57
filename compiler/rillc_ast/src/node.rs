//! Contains the AST node types.
//!
//! Nodes compare by *content*: two nodes are equal when their identifiers,
//! fields and children match, regardless of where in the source they were
//! written. This is what lets a re-parse of an edited file keep the unchanged
//! parts of the previous tree (and every result keyed on their identifiers)
//! alive.

use derive_new::new;
use enum_as_inner::EnumAsInner;
use getset::CopyGetters;
use rillc_base::location::Location;
use rillc_intern::InternedStr;

use crate::id::Id;

/// Who can see a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// The language-defined default for the declaration form.
    #[default]
    Default,

    /// Visible everywhere the enclosing symbol is.
    Public,

    /// Visible only inside the enclosing symbol.
    Private,
}

/// How a module came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Written in the source.
    Declared,

    /// Synthesized by the builder to wrap loose top-level statements.
    Implicit,
}

/// Which binding form a variable uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// A mutable `var` binding.
    Var,

    /// An immutable `const` binding.
    Const,
}

/// The payload of a [`Literal`] node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumAsInner)]
pub enum LiteralValue {
    /// An integer literal.
    Int(i64),

    /// A boolean literal.
    Bool(bool),

    /// A string literal.
    Str(String),
}

/// An expression, the uniform node type of the tree.
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum Expr {
    /// A source comment; carries no identifier.
    Comment(Comment),

    /// A reference to a name.
    Identifier(Identifier),

    /// A literal value.
    Literal(Literal),

    /// A call of a callee with arguments.
    Call(Call),

    /// A braced sequence of expressions.
    Block(Block),

    /// A declaration introducing a symbol.
    Decl(Decl),
}

impl Expr {
    /// The identifier assigned to this node, or the default identifier for
    /// comments and nodes the builder has not visited.
    #[must_use]
    pub fn id(&self) -> Id {
        match self {
            Self::Comment(_) => Id::default(),
            Self::Identifier(node) => node.id(),
            Self::Literal(node) => node.id(),
            Self::Call(node) => node.id(),
            Self::Block(node) => node.id(),
            Self::Decl(node) => node.id(),
        }
    }

    /// Where this node was written.
    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            Self::Comment(node) => node.location(),
            Self::Identifier(node) => node.location(),
            Self::Literal(node) => node.location(),
            Self::Call(node) => node.location(),
            Self::Block(node) => node.location(),
            Self::Decl(node) => node.location(),
        }
    }

    /// Whether this expression declares a module.
    #[must_use]
    pub fn is_module_decl(&self) -> bool {
        self.as_decl().is_some_and(|decl| decl.symbol.as_module().is_some())
    }

    pub(crate) fn set_id(&mut self, id: Id) {
        match self {
            Self::Comment(_) => {}
            Self::Identifier(node) => node.id = id,
            Self::Literal(node) => node.id = id,
            Self::Call(node) => node.id = id,
            Self::Block(node) => node.id = id,
            Self::Decl(node) => node.id = id,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Self::Comment(_) | Self::Identifier(_) | Self::Literal(_) => {
                Vec::new()
            }
            Self::Call(node) => std::iter::once(&mut *node.callee)
                .chain(node.args.iter_mut())
                .collect(),
            Self::Block(node) => node.body.iter_mut().collect(),
            // a declaration's subtree belongs to the declared symbol and is
            // numbered separately
            Self::Decl(_) => Vec::new(),
        }
    }
}

/// A source comment. Comments participate in the tree but receive no
/// identifier and are invisible to postorder numbering.
#[derive(Debug, Clone, new, CopyGetters)]
pub struct Comment {
    /// Where the comment was written.
    #[get_copy = "pub"]
    location: Location,

    /// The comment text, delimiters included.
    pub text: String,
}

impl PartialEq for Comment {
    fn eq(&self, other: &Self) -> bool { self.text == other.text }
}

impl Eq for Comment {}

/// A reference to a name.
#[derive(Debug, Clone, new, CopyGetters)]
pub struct Identifier {
    #[new(default)]
    #[get_copy = "pub"]
    id: Id,

    /// Where the identifier was written.
    #[get_copy = "pub"]
    location: Location,

    /// The referenced name.
    pub name: InternedStr,
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for Identifier {}

/// A literal value.
#[derive(Debug, Clone, new, CopyGetters)]
pub struct Literal {
    #[new(default)]
    #[get_copy = "pub"]
    id: Id,

    /// Where the literal was written.
    #[get_copy = "pub"]
    location: Location,

    /// The literal's value.
    pub value: LiteralValue,
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.value == other.value
    }
}

impl Eq for Literal {}

/// A call of a callee expression with argument expressions.
#[derive(Debug, Clone, new, CopyGetters)]
pub struct Call {
    #[new(default)]
    #[get_copy = "pub"]
    id: Id,

    /// Where the call was written.
    #[get_copy = "pub"]
    location: Location,

    /// The expression being called.
    pub callee: Box<Expr>,

    /// The arguments, in source order.
    pub args: Vec<Expr>,
}

impl PartialEq for Call {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.callee == other.callee
            && self.args == other.args
    }
}

impl Eq for Call {}

/// A braced sequence of expressions.
#[derive(Debug, Clone, new, CopyGetters)]
pub struct Block {
    #[new(default)]
    #[get_copy = "pub"]
    id: Id,

    /// Where the block was written.
    #[get_copy = "pub"]
    location: Location,

    /// The expressions in the block, in source order.
    pub body: Vec<Expr>,
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.body == other.body
    }
}

impl Eq for Block {}

/// A declaration. The declaration itself is numbered within the enclosing
/// symbol; the declared [`Symbol`] opens a fresh numbering scope.
#[derive(Debug, Clone, new, CopyGetters)]
pub struct Decl {
    #[new(default)]
    #[get_copy = "pub"]
    id: Id,

    /// Where the declaration was written.
    #[get_copy = "pub"]
    location: Location,

    /// The symbol this declaration introduces.
    pub symbol: Symbol,
}

impl PartialEq for Decl {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.symbol == other.symbol
    }
}

impl Eq for Decl {}

/// A declared symbol.
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum Symbol {
    /// A module.
    Module(Module),

    /// A variable.
    Variable(Variable),

    /// A function.
    Function(Function),
}

impl Symbol {
    /// The declared name.
    #[must_use]
    pub fn name(&self) -> InternedStr {
        match self {
            Self::Module(symbol) => symbol.name,
            Self::Variable(symbol) => symbol.name,
            Self::Function(symbol) => symbol.name,
        }
    }

    /// The declared visibility.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        match self {
            Self::Module(symbol) => symbol.visibility,
            Self::Variable(symbol) => symbol.visibility,
            Self::Function(symbol) => symbol.visibility,
        }
    }

    /// The identifier assigned to the symbol node itself.
    #[must_use]
    pub fn id(&self) -> Id {
        match self {
            Self::Module(symbol) => symbol.id(),
            Self::Variable(symbol) => symbol.id(),
            Self::Function(symbol) => symbol.id(),
        }
    }

    /// Where the symbol was declared.
    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            Self::Module(symbol) => symbol.location(),
            Self::Variable(symbol) => symbol.location(),
            Self::Function(symbol) => symbol.location(),
        }
    }

    pub(crate) fn set_id(&mut self, id: Id) {
        match self {
            Self::Module(symbol) => symbol.id = id,
            Self::Variable(symbol) => symbol.id = id,
            Self::Function(symbol) => symbol.id = id,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Self::Module(symbol) => symbol.body.iter_mut().collect(),
            Self::Variable(symbol) => symbol
                .type_expr
                .iter_mut()
                .chain(symbol.init.iter_mut())
                .map(|child| &mut **child)
                .collect(),
            Self::Function(symbol) => symbol.body.iter_mut().collect(),
        }
    }
}

/// A module symbol.
#[derive(Debug, Clone, new, CopyGetters)]
pub struct Module {
    #[new(default)]
    #[get_copy = "pub"]
    id: Id,

    /// Where the module was declared.
    #[get_copy = "pub"]
    location: Location,

    /// The module's name.
    pub name: InternedStr,

    /// The module's visibility.
    pub visibility: Visibility,

    /// Whether the module was written or synthesized.
    pub kind: ModuleKind,

    /// The module body, in source order.
    pub body: Vec<Expr>,
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.visibility == other.visibility
            && self.kind == other.kind
            && self.body == other.body
    }
}

impl Eq for Module {}

/// A variable symbol.
#[derive(Debug, Clone, new, CopyGetters)]
pub struct Variable {
    #[new(default)]
    #[get_copy = "pub"]
    id: Id,

    /// Where the variable was declared.
    #[get_copy = "pub"]
    location: Location,

    /// The variable's name.
    pub name: InternedStr,

    /// The variable's visibility.
    pub visibility: Visibility,

    /// The binding form used.
    pub kind: VariableKind,

    /// The declared type expression, if any.
    pub type_expr: Option<Box<Expr>>,

    /// The initializing expression, if any.
    pub init: Option<Box<Expr>>,
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.visibility == other.visibility
            && self.kind == other.kind
            && self.type_expr == other.type_expr
            && self.init == other.init
    }
}

impl Eq for Variable {}

/// A function symbol.
#[derive(Debug, Clone, new, CopyGetters)]
pub struct Function {
    #[new(default)]
    #[get_copy = "pub"]
    id: Id,

    /// Where the function was declared.
    #[get_copy = "pub"]
    location: Location,

    /// The function's name.
    pub name: InternedStr,

    /// The function's visibility.
    pub visibility: Visibility,

    /// The function body, in source order.
    pub body: Vec<Expr>,
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.visibility == other.visibility
            && self.body == other.body
    }
}

impl Eq for Function {}
