//! Normalized path-like identifiers naming items and layouts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string is not a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The identifier is the empty string.
    #[error("identifier is empty")]
    Empty,

    /// The identifier does not begin with a slash.
    #[error("invalid identifier '{0}': identifiers must start with a slash")]
    MissingLeadingSlash(String),

    /// The identifier ends with a slash.
    #[error("invalid identifier '{0}': identifiers must not end with a slash")]
    TrailingSlash(String),
}

/// A normalized, path-like name that uniquely identifies an item or layout.
///
/// Identifiers always begin with `/` and never end with `/` (except the root
/// identifier `/` itself). They are totally ordered by string comparison,
/// which is the order used wherever Kiln needs a deterministic traversal.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Creates an identifier, validating its shape.
    pub fn new(s: impl Into<String>) -> Result<Self, IdentifierError> {
        let s = s.into();
        if s.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if !s.starts_with('/') {
            return Err(IdentifierError::MissingLeadingSlash(s));
        }
        if s.len() > 1 && s.ends_with('/') {
            return Err(IdentifierError::TrailingSlash(s));
        }
        Ok(Self(s))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the extension of the last path component, without the dot.
    ///
    /// Dotfiles such as `/.htaccess` have no extension.
    pub fn ext(&self) -> Option<&str> {
        self.ext_start().map(|idx| &self.0[idx + 1..])
    }

    /// Returns the identifier with the last extension removed.
    pub fn without_ext(&self) -> &str {
        match self.ext_start() {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// Returns the byte index of the dot starting the extension, if any.
    fn ext_start(&self) -> Option<usize> {
        let base_start = self.0.rfind('/').map_or(0, |i| i + 1);
        let base = &self.0[base_start..];
        match base.rfind('.') {
            Some(0) | None => None,
            Some(dot) => Some(base_start + dot),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.0)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_identifier() {
        let id = Identifier::new("/about.md").unwrap();
        assert_eq!(id.as_str(), "/about.md");
        assert_eq!(format!("{id}"), "/about.md");
    }

    #[test]
    fn root_is_valid() {
        assert!(Identifier::new("/").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Identifier::new(""), Err(IdentifierError::Empty));
    }

    #[test]
    fn rejects_missing_slash() {
        let err = Identifier::new("about.md").unwrap_err();
        assert!(matches!(err, IdentifierError::MissingLeadingSlash(_)));
        assert!(err.to_string().contains("must start with a slash"));
    }

    #[test]
    fn rejects_trailing_slash() {
        let err = Identifier::new("/blog/").unwrap_err();
        assert!(matches!(err, IdentifierError::TrailingSlash(_)));
    }

    #[test]
    fn ext_and_without_ext() {
        let id = Identifier::new("/blog/post.html.erb").unwrap();
        assert_eq!(id.ext(), Some("erb"));
        assert_eq!(id.without_ext(), "/blog/post.html");
    }

    #[test]
    fn dot_in_directory_is_not_an_ext() {
        let id = Identifier::new("/v1.2/readme").unwrap();
        assert_eq!(id.ext(), None);
        assert_eq!(id.without_ext(), "/v1.2/readme");
    }

    #[test]
    fn dotfile_has_no_ext() {
        let id = Identifier::new("/.htaccess").unwrap();
        assert_eq!(id.ext(), None);
    }

    #[test]
    fn ordering_is_by_string() {
        let a = Identifier::new("/a.md").unwrap();
        let b = Identifier::new("/b.md").unwrap();
        assert!(a < b);
    }

    #[test]
    fn serde_roundtrip() {
        let id = Identifier::new("/dog.md").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"/dog.md\"");
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn serde_rejects_invalid() {
        let result: Result<Identifier, _> = serde_json::from_str("\"dog.md\"");
        assert!(result.is_err());
    }
}
