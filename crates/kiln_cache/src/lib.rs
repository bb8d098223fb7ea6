//! Persistent store for incremental compilation.
//!
//! This crate keeps the checksum, rule, dependency and compiled-content
//! tables of a site between runs, so that the next run recompiles only
//! what changed.

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod error;
pub mod manifest;

pub use artifact::ArtifactStore;
pub use cache::Cache;
pub use error::{CacheError, SnapshotFault};
pub use manifest::{CacheManifest, RuleRecord, StoredSnapshot};
