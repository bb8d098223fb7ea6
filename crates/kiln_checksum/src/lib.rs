//! Structural checksums for items, layouts, configuration and code snippets.
//!
//! Every checksummable value renders itself into a canonical tagged form
//! (`Kind<field=…,>`). The verbose sink keeps that text around for
//! inspection; the compact sink streams the identical bytes into XXH3-128.
//! Two values that render identically are considered unchanged between runs.

#![warn(missing_docs)]

pub mod cache;
pub mod digest;
pub mod error;

pub use cache::{ChecksumCache, ObjectChecksums, ObjectKey};
pub use digest::{canonical, digest, Checksummable, CompactDigest, DigestSink, VerboseDigest};
pub use error::ChecksumError;
