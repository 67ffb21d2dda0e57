//! Contains the basic building blocks shared by every phase of the compiler:
//! source [`location`]s and [`diagnostic`] records.

#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links
)]
#![allow(clippy::missing_const_for_fn, clippy::module_name_repetitions)]

pub mod diagnostic;
pub mod location;
