//! Contains the definition of [`Location`], a file-and-range source position.

use derive_new::new;
use getset::CopyGetters;
use rillc_intern::InternedStr;

/// A half-open region of a source file, addressed by interned file path and
/// 1-based line/column coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, new, CopyGetters,
)]
#[get_copy = "pub"]
pub struct Location {
    /// The interned path of the file this location points into.
    path: InternedStr,

    /// The line the region starts on.
    first_line: u32,

    /// The column the region starts on.
    first_column: u32,

    /// The line the region ends on.
    last_line: u32,

    /// The column the region ends on.
    last_column: u32,
}

impl Location {
    /// Creates a location that stands for the whole of the given file, used
    /// for synthesized nodes that have no narrower source region.
    #[must_use]
    pub fn whole_file(path: InternedStr) -> Self {
        Self::new(path, 1, 1, 1, 1)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.first_line, self.first_column)
    }
}
