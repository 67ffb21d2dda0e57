//! Contains the definition of the [`Diagnostic`] struct and related types.

use derive_new::new;

use crate::location::Location;

/// How severe a [`Diagnostic`] is.
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
pub enum Severity {
    /// The program is invalid and compilation cannot fully succeed.
    #[display("error")]
    Error,

    /// The program is suspicious but compilation proceeds.
    #[display("warning")]
    Warning,

    /// Additional context attached to another diagnostic.
    #[display("note")]
    Note,
}

/// A record describing one problem found while processing the program.
///
/// Diagnostics never abort a computation; queries accumulate them alongside a
/// best-effort result and callers inspect them afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct Diagnostic {
    /// Where in the source the problem was found.
    pub location: Location,

    /// How severe the problem is.
    pub severity: Severity,

    /// The message to display to the user.
    pub message: String,
}

impl Diagnostic {
    /// Creates an error diagnostic at the given location.
    #[must_use]
    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Self::new(location, Severity::Error, message.into())
    }

    /// Creates a warning diagnostic at the given location.
    #[must_use]
    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Self::new(location, Severity::Warning, message.into())
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.message, self.location)
    }
}
