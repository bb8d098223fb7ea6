//! Shared foundational types used across the Kiln compilation engine.
//!
//! This crate provides content hashing, normalized document identifiers, and
//! identifier patterns. Every other Kiln crate builds on these types.

#![warn(missing_docs)]

pub mod hash;
pub mod identifier;
pub mod pattern;

pub use hash::{ContentHash, ContentHasher};
pub use identifier::{Identifier, IdentifierError};
pub use pattern::{Pattern, PatternError, PatternKind};
