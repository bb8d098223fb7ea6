//! Identifier patterns used by rules, collection lookups, and dependencies.

use std::fmt;
use std::str::FromStr;

use crate::identifier::Identifier;

/// Error returned when a pattern cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// The glob syntax is malformed.
    #[error("invalid pattern '{pattern}': {reason}")]
    Invalid {
        /// The offending pattern source.
        pattern: String,
        /// Description from the glob compiler.
        reason: String,
    },

    /// The configured pattern flavour is not recognised.
    #[error("unknown string pattern type '{0}' (expected 'glob' or 'legacy')")]
    UnknownKind(String),
}

/// The flavour of string patterns, selected by the `string_pattern_type`
/// configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PatternKind {
    /// Path-aware globs: `*` stays within one component, `**/` spans many.
    #[default]
    Glob,
    /// Legacy patterns: `*` crosses slashes and `+` matches one or more characters.
    Legacy,
}

impl FromStr for PatternKind {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "glob" => Ok(PatternKind::Glob),
            "legacy" => Ok(PatternKind::Legacy),
            other => Err(PatternError::UnknownKind(other.to_string())),
        }
    }
}

/// A compiled identifier pattern.
///
/// Equality compares the source text and flavour, so two patterns built from
/// the same string behave identically.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    kind: PatternKind,
    compiled: glob::Pattern,
}

impl Pattern {
    /// Compiles a glob-flavoured pattern.
    pub fn new(source: &str) -> Result<Self, PatternError> {
        Self::with_kind(source, PatternKind::Glob)
    }

    /// Compiles a pattern of the given flavour.
    pub fn with_kind(source: &str, kind: PatternKind) -> Result<Self, PatternError> {
        let glob_source = match kind {
            PatternKind::Glob => source.to_string(),
            PatternKind::Legacy => source.replace('+', "?*"),
        };
        let compiled = glob::Pattern::new(&glob_source).map_err(|e| PatternError::Invalid {
            pattern: source.to_string(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            kind,
            compiled,
        })
    }

    /// Returns the pattern source as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the pattern flavour.
    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Returns `true` if the identifier matches this pattern.
    pub fn matches(&self, identifier: &Identifier) -> bool {
        self.matches_str(identifier.as_str())
    }

    /// Returns `true` if the raw string matches this pattern.
    pub fn matches_str(&self, s: &str) -> bool {
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: self.kind == PatternKind::Glob,
            require_literal_leading_dot: false,
        };
        self.compiled.matches_with(s, options)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.kind == other.kind
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?}, {})", self.kind, self.source)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn star_matches_extension() {
        let p = Pattern::new("/about.*").unwrap();
        assert!(p.matches(&id("/about.md")));
        assert!(p.matches(&id("/about.html")));
        assert!(!p.matches(&id("/giraffe.md")));
    }

    #[test]
    fn glob_star_does_not_cross_slash() {
        let p = Pattern::new("/*.md").unwrap();
        assert!(p.matches(&id("/a.md")));
        assert!(!p.matches(&id("/blog/a.md")));
    }

    #[test]
    fn glob_double_star_crosses_slash() {
        let p = Pattern::new("/**/*.md").unwrap();
        assert!(p.matches(&id("/blog/2024/a.md")));
    }

    #[test]
    fn legacy_star_crosses_slash() {
        let p = Pattern::with_kind("/blog/*", PatternKind::Legacy).unwrap();
        assert!(p.matches(&id("/blog/2024/a.md")));
    }

    #[test]
    fn legacy_plus_requires_one_char() {
        let p = Pattern::with_kind("/blog/+", PatternKind::Legacy).unwrap();
        assert!(p.matches(&id("/blog/a")));
        assert!(!p.matches_str("/blog/"));
    }

    #[test]
    fn invalid_pattern_errors() {
        let err = Pattern::new("/[unclosed").unwrap_err();
        assert!(matches!(err, PatternError::Invalid { .. }));
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("glob".parse::<PatternKind>().unwrap(), PatternKind::Glob);
        assert_eq!("legacy".parse::<PatternKind>().unwrap(), PatternKind::Legacy);
        assert!("regex".parse::<PatternKind>().is_err());
    }

    #[test]
    fn equality_by_source() {
        assert_eq!(Pattern::new("/a.*").unwrap(), Pattern::new("/a.*").unwrap());
        assert_ne!(Pattern::new("/a.*").unwrap(), Pattern::new("/b.*").unwrap());
    }
}
