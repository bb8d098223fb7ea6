//! Why something is outdated.

use std::fmt;

/// A reason for recompiling a rep or layout, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Nothing is known about a previous compilation.
    NotYetCompiled,
    /// The site's code snippets changed.
    CodeSnippetsModified,
    /// The raw content changed.
    ContentModified,
    /// The listed attributes were added, removed or changed.
    AttributesModified(Vec<String>),
    /// The rep's plan changed.
    RulesModified,
    /// The plan uses a filter that is never up to date.
    UsesAlwaysOutdatedFilter,
    /// An output file of the rep is missing.
    NotWritten,
    /// Something the item depends on changed.
    DependenciesOutdated,
}

impl Reason {
    /// The explanation shown to users.
    pub fn message(&self) -> &'static str {
        match self {
            Reason::NotYetCompiled => "This item has not yet been compiled.",
            Reason::CodeSnippetsModified => {
                "The code snippets have been modified since the last time the site was compiled."
            }
            Reason::ContentModified => {
                "The content of this item has been modified since the last time the site was compiled."
            }
            Reason::AttributesModified(_) => {
                "The attributes of this item have been modified since the last time the site was compiled."
            }
            Reason::RulesModified => {
                "The rules file has been modified since the last time the site was compiled."
            }
            Reason::UsesAlwaysOutdatedFilter => {
                "This item rep uses one or more filters that cannot be used with incremental compilation."
            }
            Reason::NotWritten => {
                "This item representation has not yet been written to the output directory (but it does have a path)."
            }
            Reason::DependenciesOutdated => {
                "This item uses content or attributes that have changed since the last time the site was compiled."
            }
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
