//! Textual and binary document payloads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The payload of an item, layout, or compiled snapshot.
///
/// Textual content is identified by value; binary content is identified by
/// the path of the file holding the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Content {
    /// In-memory text.
    Textual(String),
    /// Bytes stored in a file on disk.
    Binary(PathBuf),
}

impl Content {
    /// Returns `true` for binary content.
    pub fn is_binary(&self) -> bool {
        matches!(self, Content::Binary(_))
    }

    /// Returns the text if this is textual content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Textual(s) => Some(s),
            Content::Binary(_) => None,
        }
    }

    /// Returns the file path if this is binary content.
    pub fn binary_path(&self) -> Option<&Path> {
        match self {
            Content::Binary(p) => Some(p),
            Content::Textual(_) => None,
        }
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Textual(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Textual(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textual_accessors() {
        let c = Content::from("hello");
        assert!(!c.is_binary());
        assert_eq!(c.as_text(), Some("hello"));
        assert!(c.binary_path().is_none());
    }

    #[test]
    fn binary_accessors() {
        let c = Content::Binary(PathBuf::from("/tmp/logo.png"));
        assert!(c.is_binary());
        assert!(c.as_text().is_none());
        assert_eq!(c.binary_path(), Some(Path::new("/tmp/logo.png")));
    }

    #[test]
    fn textual_identity_is_by_value() {
        assert_eq!(Content::from("a"), Content::from("a".to_string()));
        assert_ne!(Content::from("a"), Content::from("b"));
    }
}
