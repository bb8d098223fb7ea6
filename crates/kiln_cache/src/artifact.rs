//! Content-addressed storage of compiled snapshots.
//!
//! Each textual snapshot is stored at `<cache_dir>/compiled/<key>.snap`,
//! where the key is the hex content hash of the text. Every file carries a
//! header with magic bytes, format version and a payload checksum.

use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, SnapshotFault};

/// Magic bytes identifying a Kiln snapshot artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"KILN";

/// Current artifact format version. Increment on breaking changes to
/// the header or payload format.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Subdirectory holding snapshot artifacts.
const COMPILED_SUBDIR: &str = "compiled";

/// File extension of snapshot artifacts.
const SNAPSHOT_EXT: &str = "snap";

/// Header prepended to every stored snapshot for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"KILN"`.
    pub magic: [u8; 4],

    /// Artifact format version.
    pub format_version: u32,

    /// Kiln version that produced this artifact.
    pub kiln_version: String,

    /// Content hash of the payload (for integrity checks).
    pub checksum: ContentHash,
}

/// Content-addressed store for compiled snapshot text.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `<cache_dir>/compiled`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join(COMPILED_SUBDIR),
        }
    }

    /// Returns the file path of the artifact with the given key.
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{SNAPSHOT_EXT}"))
    }

    /// Writes a snapshot and returns its key.
    ///
    /// Writing the same text twice yields the same key; an existing valid
    /// artifact is left in place.
    pub fn write(&self, data: &[u8], kiln_version: &str) -> Result<String, CacheError> {
        let checksum = ContentHash::from_bytes(data);
        let key = checksum.to_string();
        let path = self.artifact_path(&key);
        if self.read(&key).is_ok() {
            return Ok(key);
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            kiln_version: kiln_version.to_string(),
            checksum,
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Encode {
                what: "snapshot header",
                reason: e.to_string(),
            })?;

        // 4-byte header length (little-endian) + header + payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        std::fs::write(&path, &output).map_err(|e| CacheError::Io { path, source: e })?;
        Ok(key)
    }

    /// Reads a snapshot, validating its header and checksum.
    pub fn read(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let path = self.artifact_path(key);
        let raw = std::fs::read(&path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e,
        })?;
        let invalid = |fault: SnapshotFault| CacheError::Snapshot {
            path: path.clone(),
            fault,
        };

        let len_bytes: [u8; 4] = raw
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| invalid(SnapshotFault::Truncated))?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        let header_bytes = raw
            .get(4..4 + header_len)
            .ok_or_else(|| invalid(SnapshotFault::Truncated))?;
        let (header, _): (ArtifactHeader, usize) =
            bincode::serde::decode_from_slice(header_bytes, bincode::config::standard())
                .map_err(|e| invalid(SnapshotFault::Undecodable(e.to_string())))?;

        if header.magic != ARTIFACT_MAGIC {
            return Err(invalid(SnapshotFault::BadMagic));
        }
        if header.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(invalid(SnapshotFault::FormatVersion {
                expected: ARTIFACT_FORMAT_VERSION,
                found: header.format_version,
            }));
        }

        let payload = &raw[4 + header_len..];
        let actual = ContentHash::from_bytes(payload);
        if actual != header.checksum {
            return Err(invalid(SnapshotFault::Checksum {
                expected: header.checksum.to_string(),
                actual: actual.to_string(),
            }));
        }
        Ok(payload.to_vec())
    }

    /// Removes artifacts whose key is not in `live_keys`.
    ///
    /// Returns the number of files removed.
    pub fn gc(&self, live_keys: &[&str]) -> Result<usize, CacheError> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let io = |path: &Path, e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir).map_err(|e| io(&self.dir, e))? {
            let path = entry.map_err(|e| io(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !live_keys.contains(&stem) {
                    std::fs::remove_file(&path).map_err(|e| io(&path, e))?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
