//! Error types for checksum computation.

use std::path::PathBuf;

/// Errors that can occur while computing a checksum.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    /// The file backing binary content could not be read.
    #[error("cannot checksum binary content at {path}: {source}")]
    Unreadable {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A stored object key could not be parsed.
    #[error("invalid checksum object key '{0}'")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_display() {
        let err = ChecksumError::Unreadable {
            path: PathBuf::from("/site/content/logo.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let msg = err.to_string();
        assert!(msg.contains("logo.png"));
        assert!(msg.contains("gone"));
    }
}
