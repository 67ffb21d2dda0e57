//! Contains the abstract syntax tree of the language, the stable node
//! identifiers that queries key their results on, and the builder that
//! assigns those identifiers to freshly parsed trees.
//!
//! Node identifiers are designed to survive edits: they are derived from the
//! symbol nesting (a dotted symbol path) and a postorder numbering that
//! restarts at every symbol boundary, so editing the body of one function
//! only perturbs identifiers inside that function.

#![deny(
    missing_debug_implementations,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links
)]
#![allow(
    clippy::missing_panics_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

pub mod builder;
pub mod id;
pub mod node;

pub use crate::{
    builder::{BuildResult, Builder},
    id::{ContextIdExt, Id},
};
