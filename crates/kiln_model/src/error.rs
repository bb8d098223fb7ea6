//! Error types for building the content model.

use kiln_common::{Identifier, IdentifierError, PatternError};

use crate::document::DocumentKind;

/// Errors that can occur while assembling items, layouts, and collections.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Two documents of the same kind share an identifier.
    #[error("duplicate {kind} identifier {identifier}")]
    DuplicateIdentifier {
        /// The kind of the colliding documents.
        kind: DocumentKind,
        /// The identifier used twice.
        identifier: Identifier,
    },

    /// A string could not be turned into an identifier.
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),

    /// A pattern or the configured pattern flavour is invalid.
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_identifier_display() {
        let err = ModelError::DuplicateIdentifier {
            kind: DocumentKind::Item,
            identifier: Identifier::new("/about.md").unwrap(),
        };
        assert_eq!(err.to_string(), "duplicate item identifier /about.md");
    }

    #[test]
    fn identifier_error_is_transparent() {
        let err: ModelError = IdentifierError::Empty.into();
        assert_eq!(err.to_string(), "identifier is empty");
    }
}
