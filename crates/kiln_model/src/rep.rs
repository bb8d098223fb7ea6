//! Item representations: named output variants of an item.

use serde::{Deserialize, Serialize};
use std::fmt;

use kiln_common::Identifier;

/// The symbolic name of an item representation (e.g. `default`, `pdf`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepName(String);

impl RepName {
    /// The name used when a rule does not specify one.
    pub const DEFAULT: &'static str = "default";

    /// Creates a rep name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the `default` rep name.
    pub fn default_name() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One named output variant of an item, compiled through one pipeline.
///
/// The item is referenced by identifier rather than by object identity so
/// that a rep loaded in a later run correlates with the records stored by an
/// earlier one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemRep {
    /// Identifier of the item this rep belongs to.
    pub item: Identifier,
    /// Name of the representation.
    pub name: RepName,
}

impl ItemRep {
    /// Creates a rep for the given item.
    pub fn new(item: Identifier, name: RepName) -> Self {
        Self { item, name }
    }

    /// Creates the `default` rep of an item.
    pub fn default_of(item: Identifier) -> Self {
        Self::new(item, RepName::default_name())
    }
}

impl fmt::Display for ItemRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {}, rep {}", self.item, self.name)
    }
}
