//! Site customization code.

/// A piece of site-customization code.
///
/// Kiln never executes snippets; they only participate in checksums, so any
/// change to them invalidates every rep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSnippet {
    /// The source text.
    pub data: String,
    /// The file the snippet was read from.
    pub filename: String,
}

impl CodeSnippet {
    /// Creates a code snippet.
    pub fn new(data: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            filename: filename.into(),
        }
    }
}
