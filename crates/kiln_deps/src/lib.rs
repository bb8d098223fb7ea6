//! Property-tagged dependency graph between compilation entities.
//!
//! While an item rep is compiled, every read of another entity's content,
//! attributes, compiled content, output path or of the configuration is
//! recorded as an edge from the item to that entity. The next run consults
//! these edges to decide which items must be recompiled.

#![warn(missing_docs)]

pub mod error;
pub mod props;
pub mod store;
pub mod target;

pub use error::DependencyError;
pub use props::{PropValue, PropertySet};
pub use store::{
    Dependency, DependencyEdge, DependencyStore, DependencyTable, KnownIdentifiers, TargetState,
};
pub use target::{DependencyTarget, Dependent};
