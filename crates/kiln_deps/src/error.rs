//! Error types for dependency records.

/// Errors that can occur while decoding dependency records.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    /// A stored dependent key could not be parsed.
    #[error("invalid dependent key '{0}'")]
    InvalidDependent(String),
}
