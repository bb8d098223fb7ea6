//! The complete set of inputs handed to the compiler by a data source.

use crate::code_snippet::CodeSnippet;
use crate::collection::{ItemCollection, LayoutCollection};
use crate::config::Configuration;
use crate::document::{Item, Layout};
use crate::error::ModelError;

/// A loaded site: configuration, items, layouts, and code snippets.
///
/// Immutable for the duration of a compilation run.
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration.
    pub config: Configuration,
    /// Items in data-source order.
    pub items: ItemCollection,
    /// Layouts in data-source order.
    pub layouts: LayoutCollection,
    /// Site customization code.
    pub code_snippets: Vec<CodeSnippet>,
}

impl Site {
    /// Assembles a site, building identifier-indexed collections.
    pub fn new(
        config: Configuration,
        items: Vec<Item>,
        layouts: Vec<Layout>,
        code_snippets: Vec<CodeSnippet>,
    ) -> Result<Self, ModelError> {
        let items = ItemCollection::new(&config, items)?;
        let layouts = LayoutCollection::new(&config, layouts)?;
        Ok(Self {
            config,
            items,
            layouts,
            code_snippets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Attributes;
    use kiln_common::Identifier;
    use std::collections::BTreeMap;

    #[test]
    fn builds_collections() {
        let config = Configuration::new("/site", BTreeMap::new()).with_defaults();
        let site = Site::new(
            config,
            vec![Item::new("a", Attributes::new(), Identifier::new("/a.md").unwrap())],
            vec![Layout::new("l", Attributes::new(), Identifier::new("/l.html").unwrap())],
            vec![CodeSnippet::new("helpers", "/lib/helpers.rs")],
        )
        .unwrap();
        assert_eq!(site.items.len(), 1);
        assert_eq!(site.layouts.len(), 1);
        assert_eq!(site.code_snippets.len(), 1);
    }
}
