//! Items and layouts: the source documents of a site.

use std::collections::BTreeMap;
use std::fmt;

use kiln_common::Identifier;

use crate::content::Content;
use crate::value::Value;

/// Document attributes, sorted by key.
pub type Attributes = BTreeMap<String, Value>;

/// Distinguishes the two kinds of source documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKind {
    /// A document compiled into one or more outputs.
    Item,
    /// A template that wraps compiled item content.
    Layout,
}

impl DocumentKind {
    /// Returns the type tag used in canonical checksum renderings.
    pub fn tag(self) -> &'static str {
        match self {
            DocumentKind::Item => "Item",
            DocumentKind::Layout => "Layout",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Item => f.write_str("item"),
            DocumentKind::Layout => f.write_str("layout"),
        }
    }
}

/// Common read access to items and layouts.
pub trait Document {
    /// The kind of document.
    const KIND: DocumentKind;

    /// The unique identifier of the document.
    fn identifier(&self) -> &Identifier;

    /// The raw content of the document.
    fn content(&self) -> &Content;

    /// The document attributes.
    fn attributes(&self) -> &Attributes;

    /// Looks up a single attribute.
    fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes().get(key)
    }
}

/// A source document to be compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    content: Content,
    attributes: Attributes,
    identifier: Identifier,
}

impl Item {
    /// Creates an item.
    pub fn new(content: impl Into<Content>, attributes: Attributes, identifier: Identifier) -> Self {
        Self {
            content: content.into(),
            attributes,
            identifier,
        }
    }

    /// Replaces the raw content. Intended for preprocessing only.
    pub fn set_content(&mut self, content: impl Into<Content>) {
        self.content = content.into();
    }

    /// Sets a single attribute. Intended for preprocessing only.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }
}

impl Document for Item {
    const KIND: DocumentKind = DocumentKind::Item;

    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    fn content(&self) -> &Content {
        &self.content
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// A template used to wrap compiled item content.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    content: Content,
    attributes: Attributes,
    identifier: Identifier,
}

impl Layout {
    /// Creates a layout.
    pub fn new(content: impl Into<Content>, attributes: Attributes, identifier: Identifier) -> Self {
        Self {
            content: content.into(),
            attributes,
            identifier,
        }
    }
}

impl Document for Layout {
    const KIND: DocumentKind = DocumentKind::Layout;

    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    fn content(&self) -> &Content {
        &self.content
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}
