//! Ordered, identifier-indexed collections of items and layouts.

use std::collections::HashMap;

use kiln_common::{Identifier, Pattern, PatternError, PatternKind};

use crate::config::Configuration;
use crate::document::{Document, Item, Layout};
use crate::error::ModelError;

/// An ordered sequence of documents with an identifier index.
///
/// The order is the order the data source handed the documents over and is
/// never changed afterwards. Pattern lookups honour the pattern flavour of
/// the configuration the collection was built with.
#[derive(Debug, Clone)]
pub struct DocumentCollection<D> {
    documents: Vec<D>,
    index: HashMap<Identifier, usize>,
    pattern_kind: PatternKind,
}

/// The items of a site.
pub type ItemCollection = DocumentCollection<Item>;

/// The layouts of a site.
pub type LayoutCollection = DocumentCollection<Layout>;

impl<D: Document> DocumentCollection<D> {
    /// Builds a collection, rejecting duplicate identifiers.
    pub fn new(config: &Configuration, documents: Vec<D>) -> Result<Self, ModelError> {
        let pattern_kind = config.pattern_kind()?;
        let mut index = HashMap::with_capacity(documents.len());
        for (i, doc) in documents.iter().enumerate() {
            if index.insert(doc.identifier().clone(), i).is_some() {
                return Err(ModelError::DuplicateIdentifier {
                    kind: D::KIND,
                    identifier: doc.identifier().clone(),
                });
            }
        }
        Ok(Self {
            documents,
            index,
            pattern_kind,
        })
    }

    /// Looks up a document by identifier.
    pub fn get(&self, identifier: &Identifier) -> Option<&D> {
        self.index.get(identifier).map(|&i| &self.documents[i])
    }

    /// Returns `true` if a document with this identifier exists.
    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.index.contains_key(identifier)
    }

    /// Compiles a pattern with this collection's flavour.
    pub fn pattern(&self, source: &str) -> Result<Pattern, PatternError> {
        Pattern::with_kind(source, self.pattern_kind)
    }

    /// The pattern flavour of this collection.
    pub fn pattern_kind(&self) -> PatternKind {
        self.pattern_kind
    }

    /// Iterates over the documents matching a compiled pattern.
    pub fn matching<'a>(&'a self, pattern: &'a Pattern) -> impl Iterator<Item = &'a D> + 'a {
        self.documents
            .iter()
            .filter(move |d| pattern.matches(d.identifier()))
    }

    /// Iterates over all documents in order.
    pub fn iter(&self) -> std::slice::Iter<'_, D> {
        self.documents.iter()
    }

    /// Iterates over all identifiers in order.
    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.documents.iter().map(Document::identifier)
    }

    /// The number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if the collection has no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl<'a, D: Document> IntoIterator for &'a DocumentCollection<D> {
    type Item = &'a D;
    type IntoIter = std::slice::Iter<'a, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
