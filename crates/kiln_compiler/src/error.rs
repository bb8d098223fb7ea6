//! Error types for rule resolution and compilation.

use std::path::PathBuf;

use kiln_cache::CacheError;
use kiln_checksum::ChecksumError;
use kiln_common::{Identifier, PatternError};
use kiln_model::{ItemRep, ModelError};

use crate::filter::FilterError;

/// Errors that abort a compilation run.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// No compile rule matches an item.
    #[error("no compile rule matches item {item}")]
    NoMatchingRule {
        /// The unmatched item.
        item: Identifier,
    },

    /// A layout step names a layout the site does not have.
    #[error("{rep} lays out with {layout}, but no such layout exists")]
    NoSuchLayout {
        /// The rep whose plan has the layout step.
        rep: ItemRep,
        /// The missing layout.
        layout: Identifier,
    },

    /// A layout exists but no layout rule says how to apply it.
    #[error("no layout rule matches layout {layout}")]
    NoMatchingLayoutRule {
        /// The layout without a rule.
        layout: Identifier,
    },

    /// A step names a filter that is not registered.
    #[error("{rep} uses unknown filter '{filter}'")]
    UnknownFilter {
        /// The rep whose plan uses the filter.
        rep: ItemRep,
        /// The unregistered filter name.
        filter: String,
    },

    /// A filter waited on a rep that no rule produces.
    #[error("{rep} was requested, but no rule produces it")]
    UnknownRep {
        /// The requested rep.
        rep: ItemRep,
    },

    /// Reps wait on each other's compiled content.
    #[error("dependency cycle detected: {}", format_chain(.chain))]
    DependencyCycle {
        /// The waiting chain, starting and ending with the same rep.
        chain: Vec<ItemRep>,
    },

    /// A rule pattern failed to compile.
    #[error("invalid rule: {0}")]
    InvalidRule(#[from] PatternError),

    /// A filter failed.
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    /// An input could not be checksummed.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    /// The persistent store could not be read or written.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The site model is inconsistent.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// An output file could not be written.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The output path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

fn format_chain(chain: &[ItemRep]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A filter failure, with the rep and step it happened in.
///
/// The original error is kept intact; [`CompilationError::unwrap`] hands it
/// back so callers can downcast it.
#[derive(Debug, thiserror::Error)]
#[error("error while compiling {rep} ({step})")]
pub struct CompilationError {
    /// The rep being compiled.
    pub rep: ItemRep,
    /// Description of the failing step.
    pub step: String,
    source: FilterError,
}

impl CompilationError {
    /// Wraps a filter error.
    pub fn new(rep: ItemRep, step: impl Into<String>, source: FilterError) -> Self {
        Self {
            rep,
            step: step.into(),
            source,
        }
    }

    /// The original error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Returns the original error, discarding the context.
    pub fn unwrap(self) -> FilterError {
        self.source
    }
}
