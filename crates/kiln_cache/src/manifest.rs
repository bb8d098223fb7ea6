//! The persisted tables of a compiled site.
//!
//! The manifest is stored as `manifest.json` in the cache directory. It holds
//! everything the next run needs to decide what is outdated: object
//! checksums, per-rep rule checksums and output paths, the dependency graph,
//! the identifiers that existed, the reps a failed run left unfinished, and
//! the index of compiled snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use kiln_checksum::{ObjectChecksums, ObjectKey};
use kiln_common::ContentHash;
use kiln_deps::{DependencyTable, KnownIdentifiers};
use kiln_model::ItemRep;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Name of the manifest file within the cache directory.
const MANIFEST_FILE: &str = "manifest.json";

/// Top-level manifest of a compiled site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Kiln version that produced this manifest. Discarded on change.
    pub kiln_version: String,

    /// Checksums of every object as of the last run.
    pub checksums: BTreeMap<ObjectKey, ObjectChecksums>,

    /// Rule checksum and output paths of every rep.
    #[serde(with = "rep_keyed")]
    pub rules: BTreeMap<ItemRep, RuleRecord>,

    /// Dependency edges of every item.
    pub dependencies: DependencyTable,

    /// Identifiers present in the last run.
    pub known: KnownIdentifiers,

    /// Reps a failed run did not finish.
    pub pending: BTreeSet<ItemRep>,

    /// Stored snapshots of every rep, by snapshot name.
    #[serde(with = "rep_keyed")]
    pub compiled: BTreeMap<ItemRep, BTreeMap<String, StoredSnapshot>>,
}

/// What the last run knew about a rep's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Checksum of the rep's plan.
    pub checksum: ContentHash,
    /// Output paths the plan writes, relative to the output directory.
    pub paths: Vec<PathBuf>,
}

/// Where a compiled snapshot is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredSnapshot {
    /// Text stored as a `compiled/<key>.snap` artifact.
    Textual {
        /// Artifact key (hex content hash of the text).
        key: String,
    },
    /// Binary content living at a path on disk.
    Binary {
        /// The file holding the bytes.
        path: PathBuf,
    },
}

impl CacheManifest {
    /// Creates a new, empty manifest for the given Kiln version.
    pub fn new(kiln_version: &str) -> Self {
        Self {
            kiln_version: kiln_version.to_string(),
            ..Self::default()
        }
    }

    /// Reads the manifest from the cache directory.
    pub fn read(cache_dir: &Path) -> Result<Self, CacheError> {
        let path = cache_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| CacheError::CorruptManifest {
            path,
            reason: e.to_string(),
        })
    }

    /// Loads the manifest from the cache directory, returning `None` if
    /// the file doesn't exist or can't be parsed.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        match Self::read(cache_dir) {
            Ok(manifest) => Some(manifest),
            Err(e) if e.is_missing() => None,
            Err(e) => {
                tracing::warn!("{e}; starting fresh");
                None
            }
        }
    }

    /// Saves the manifest to the cache directory, replacing any previous
    /// manifest atomically.
    ///
    /// Creates the cache directory if it doesn't exist.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        let path = cache_dir.join(MANIFEST_FILE);
        let tmp = cache_dir.join(format!("{MANIFEST_FILE}.tmp"));
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Encode {
            what: "cache manifest",
            reason: e.to_string(),
        })?;
        std::fs::write(&tmp, json).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Returns `true` if this manifest was produced by a compatible Kiln version.
    pub fn is_compatible(&self, current_version: &str) -> bool {
        self.kiln_version == current_version
    }
}

/// Serializes a rep-keyed map as a list of `[rep, value]` pairs, since JSON
/// object keys must be strings.
mod rep_keyed {
    use std::collections::BTreeMap;

    use kiln_model::ItemRep;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, V>(map: &BTreeMap<ItemRep, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<ItemRep, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        let pairs: Vec<(ItemRep, V)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
