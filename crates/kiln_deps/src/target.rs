//! The two ends of a dependency edge.

use std::fmt;
use std::str::FromStr;

use kiln_common::Identifier;
use serde::{Deserialize, Serialize};

use crate::error::DependencyError;

/// An entity whose compilation can depend on other entities.
///
/// Serialized as `item:/about.md` or `layout:/default.html` so it can key a
/// JSON object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dependent {
    /// An item; all of its reps share one set of edges.
    Item(Identifier),
    /// A layout.
    Layout(Identifier),
}

impl fmt::Display for Dependent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependent::Item(id) => write!(f, "item {id}"),
            Dependent::Layout(id) => write!(f, "layout {id}"),
        }
    }
}

impl FromStr for Dependent {
    type Err = DependencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DependencyError::InvalidDependent(s.to_string());
        if let Some(rest) = s.strip_prefix("item:") {
            Identifier::new(rest).map(Dependent::Item).map_err(|_| invalid())
        } else if let Some(rest) = s.strip_prefix("layout:") {
            Identifier::new(rest)
                .map(Dependent::Layout)
                .map_err(|_| invalid())
        } else {
            Err(invalid())
        }
    }
}

impl TryFrom<String> for Dependent {
    type Error = DependencyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Dependent> for String {
    fn from(dependent: Dependent) -> Self {
        match dependent {
            Dependent::Item(id) => format!("item:{id}"),
            Dependent::Layout(id) => format!("layout:{id}"),
        }
    }
}

/// What a dependent can depend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "identifier", rename_all = "snake_case")]
pub enum DependencyTarget {
    /// A single item.
    Item(Identifier),
    /// A single layout.
    Layout(Identifier),
    /// The site configuration.
    Config,
    /// The item collection, optionally narrowed by identifier patterns.
    Items,
    /// The layout collection, optionally narrowed by identifier patterns.
    Layouts,
}

impl DependencyTarget {
    /// The label shown in diagnostic lines.
    pub fn kind_label(&self) -> &'static str {
        match self {
            DependencyTarget::Item(_) => "item",
            DependencyTarget::Layout(_) => "layout",
            DependencyTarget::Config => "config",
            DependencyTarget::Items => "items",
            DependencyTarget::Layouts => "layouts",
        }
    }
}
