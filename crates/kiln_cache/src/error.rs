//! Error types for the site cache.

use std::fmt;
use std::path::PathBuf;

/// Errors raised while reading or writing the site cache.
///
/// Loading is fail-safe: the cache turns these into a cold start or a
/// snapshot miss. Flushing at the end of a run propagates them.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache file or directory could not be read or written.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// `manifest.json` exists but is not a manifest.
    #[error("corrupt cache manifest {path}: {reason}")]
    CorruptManifest {
        /// The manifest file.
        path: PathBuf,
        /// What the JSON parser reported.
        reason: String,
    },

    /// A stored snapshot failed validation.
    #[error("unusable snapshot {path}: {fault}")]
    Snapshot {
        /// The snapshot file.
        path: PathBuf,
        /// What is wrong with it.
        fault: SnapshotFault,
    },

    /// A table could not be encoded for writing.
    #[error("cannot encode {what}: {reason}")]
    Encode {
        /// Which table or header was being encoded.
        what: &'static str,
        /// What the encoder reported.
        reason: String,
    },
}

impl CacheError {
    /// Returns `true` if the error means the file simply is not there.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Why a stored snapshot was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotFault {
    /// The file ends before its header does.
    Truncated,
    /// The header bytes do not decode.
    Undecodable(String),
    /// The header does not start with the snapshot magic.
    BadMagic,
    /// The header was written by another snapshot format.
    FormatVersion {
        /// The version this build reads.
        expected: u32,
        /// The version found in the header.
        found: u32,
    },
    /// The payload does not hash to the checksum in the header.
    Checksum {
        /// Checksum recorded in the header.
        expected: String,
        /// Checksum of the payload on disk.
        actual: String,
    },
}

impl fmt::Display for SnapshotFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => f.write_str("truncated header"),
            Self::Undecodable(reason) => write!(f, "undecodable header ({reason})"),
            Self::BadMagic => f.write_str("missing magic bytes"),
            Self::FormatVersion { expected, found } => {
                write!(f, "format version {found}, expected {expected}")
            }
            Self::Checksum { expected, actual } => {
                write!(f, "payload checksum {actual} does not match header {expected}")
            }
        }
    }
}
