//! High-level cache orchestrator.
//!
//! The `Cache` type ties the manifest and the snapshot store together into
//! the single persistent store the compiler loads at the start of a run and
//! flushes at the end.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_checksum::{ObjectChecksums, ObjectKey};
use kiln_model::{Content, ItemRep};

use crate::artifact::ArtifactStore;
use crate::error::CacheError;
use crate::manifest::{CacheManifest, RuleRecord, StoredSnapshot};

/// Persistent state of a site between runs.
///
/// Reads are fail-safe: a missing, corrupt or version-mismatched manifest
/// yields an empty cache, and an unreadable snapshot is a cache miss.
#[derive(Debug)]
pub struct Cache {
    cache_dir: PathBuf,
    manifest: CacheManifest,
    store: ArtifactStore,
    kiln_version: String,
}

impl Cache {
    /// Loads an existing cache or creates a fresh one.
    pub fn load_or_create(cache_dir: &Path, kiln_version: &str) -> Self {
        let manifest = match CacheManifest::load(cache_dir) {
            Some(m) if m.is_compatible(kiln_version) => m,
            Some(m) => {
                tracing::warn!(
                    found = %m.kiln_version,
                    current = kiln_version,
                    "discarding cache written by another kiln version"
                );
                CacheManifest::new(kiln_version)
            }
            None => CacheManifest::new(kiln_version),
        };

        Self {
            cache_dir: cache_dir.to_path_buf(),
            manifest,
            store: ArtifactStore::new(cache_dir),
            kiln_version: kiln_version.to_string(),
        }
    }

    /// The directory holding the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the current manifest.
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Returns the manifest for updating ahead of a flush.
    pub fn manifest_mut(&mut self) -> &mut CacheManifest {
        &mut self.manifest
    }

    /// The checksums an object had in the last run.
    pub fn checksums_of(&self, key: &ObjectKey) -> Option<&ObjectChecksums> {
        self.manifest.checksums.get(key)
    }

    /// What the last run knew about a rep's plan.
    pub fn rule_record(&self, rep: &ItemRep) -> Option<&RuleRecord> {
        self.manifest.rules.get(rep)
    }

    /// Returns `true` if a failed run left this rep unfinished.
    pub fn is_pending(&self, rep: &ItemRep) -> bool {
        self.manifest.pending.contains(rep)
    }

    /// Loads every stored snapshot of a rep.
    ///
    /// Returns `None` if the rep has no stored snapshots or any of them
    /// cannot be read back.
    pub fn load_compiled(&self, rep: &ItemRep) -> Option<BTreeMap<String, Content>> {
        let stored = self.manifest.compiled.get(rep)?;
        let mut out = BTreeMap::new();
        for (name, snapshot) in stored {
            let content = match snapshot {
                StoredSnapshot::Textual { key } => match self.store.read(key) {
                    Ok(bytes) => Content::Textual(String::from_utf8(bytes).ok()?),
                    Err(e) => {
                        tracing::debug!(rep = %rep, snapshot = %name, "compiled snapshot miss: {e}");
                        return None;
                    }
                },
                StoredSnapshot::Binary { path } if path.exists() => Content::Binary(path.clone()),
                StoredSnapshot::Binary { .. } => return None,
            };
            out.insert(name.clone(), content);
        }
        Some(out)
    }

    /// Stores the snapshots of a rep, replacing any previous ones.
    pub fn store_compiled(
        &mut self,
        rep: &ItemRep,
        snapshots: &BTreeMap<String, Content>,
    ) -> Result<(), CacheError> {
        let mut stored = BTreeMap::new();
        for (name, content) in snapshots {
            let entry = match content {
                Content::Textual(text) => StoredSnapshot::Textual {
                    key: self.store.write(text.as_bytes(), &self.kiln_version)?,
                },
                Content::Binary(path) => StoredSnapshot::Binary { path: path.clone() },
            };
            stored.insert(name.clone(), entry);
        }
        self.manifest.compiled.insert(rep.clone(), stored);
        Ok(())
    }

    /// Persists the manifest to disk atomically.
    pub fn save(&self) -> Result<(), CacheError> {
        self.manifest.save(&self.cache_dir)
    }

    /// Removes snapshot artifacts no rep refers to.
    ///
    /// Returns the number of files removed.
    pub fn gc(&self) -> Result<usize, CacheError> {
        let live_keys: Vec<&str> = self
            .manifest
            .compiled
            .values()
            .flat_map(BTreeMap::values)
            .filter_map(|s| match s {
                StoredSnapshot::Textual { key } => Some(key.as_str()),
                StoredSnapshot::Binary { .. } => None,
            })
            .collect();
        let removed = self.store.gc(&live_keys)?;
        if removed > 0 {
            tracing::debug!(removed, "removed obsolete compiled snapshots");
        }
        Ok(removed)
    }
}
