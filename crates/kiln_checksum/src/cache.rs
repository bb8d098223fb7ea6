//! Per-object checksums and the per-run digest cache.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use kiln_common::{ContentHash, Identifier};
use kiln_model::{CodeSnippet, Configuration, Document, Site};
use serde::{Deserialize, Serialize};

use crate::digest::{digest, Checksummable};
use crate::error::ChecksumError;

/// Names an object whose checksums are tracked across runs.
///
/// Serialized as a plain string (`item:/about.md`, `layout:/default.html`,
/// `config`, `code_snippets`) so it can key a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ObjectKey {
    /// An item, by identifier.
    Item(Identifier),
    /// A layout, by identifier.
    Layout(Identifier),
    /// The site configuration.
    Config,
    /// All code snippets taken together.
    CodeSnippets,
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKey::Item(id) => write!(f, "item:{id}"),
            ObjectKey::Layout(id) => write!(f, "layout:{id}"),
            ObjectKey::Config => f.write_str("config"),
            ObjectKey::CodeSnippets => f.write_str("code_snippets"),
        }
    }
}

impl FromStr for ObjectKey {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChecksumError::InvalidKey(s.to_string());
        match s {
            "config" => Ok(ObjectKey::Config),
            "code_snippets" => Ok(ObjectKey::CodeSnippets),
            _ => {
                if let Some(rest) = s.strip_prefix("item:") {
                    Identifier::new(rest)
                        .map(ObjectKey::Item)
                        .map_err(|_| invalid())
                } else if let Some(rest) = s.strip_prefix("layout:") {
                    Identifier::new(rest)
                        .map(ObjectKey::Layout)
                        .map_err(|_| invalid())
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = ChecksumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.to_string()
    }
}

/// The checksums recorded for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectChecksums {
    /// Checksum of the raw content, for documents.
    pub content: Option<ContentHash>,
    /// Checksum of each attribute (or configuration entry) value.
    pub attributes: BTreeMap<String, ContentHash>,
    /// Checksum of the object as a whole.
    pub whole: ContentHash,
}

impl ObjectChecksums {
    /// Computes the checksums of an item or layout.
    pub fn of_document<D: Document + Checksummable>(doc: &D) -> Result<Self, ChecksumError> {
        Ok(Self {
            content: Some(digest(doc.content())?),
            attributes: attribute_checksums(doc.attributes())?,
            whole: digest(doc)?,
        })
    }

    /// Computes the checksums of the configuration, one per entry.
    pub fn of_config(config: &Configuration) -> Result<Self, ChecksumError> {
        Ok(Self {
            content: None,
            attributes: attribute_checksums(config.entries())?,
            whole: digest(config)?,
        })
    }

    /// Computes the single checksum covering all code snippets.
    pub fn of_code_snippets(snippets: &[CodeSnippet]) -> Result<Self, ChecksumError> {
        Ok(Self {
            content: None,
            attributes: BTreeMap::new(),
            whole: digest(snippets)?,
        })
    }

    /// Returns the attribute keys that were added, removed or changed
    /// relative to `previous`, sorted.
    pub fn changed_attributes(&self, previous: &ObjectChecksums) -> Vec<String> {
        let mut keys: Vec<String> = self
            .attributes
            .iter()
            .filter(|(k, v)| previous.attributes.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .chain(
                previous
                    .attributes
                    .keys()
                    .filter(|k| !self.attributes.contains_key(*k))
                    .cloned(),
            )
            .collect();
        keys.sort();
        keys
    }
}

fn attribute_checksums<T: Checksummable>(
    entries: &BTreeMap<String, T>,
) -> Result<BTreeMap<String, ContentHash>, ChecksumError> {
    entries
        .iter()
        .map(|(k, v)| -> Result<_, ChecksumError> { Ok((k.clone(), digest(v)?)) })
        .collect()
}

/// Memoizes current-run checksums per object.
///
/// The site is immutable for the duration of a run, so an object's
/// checksums are computed at most once.
#[derive(Debug, Default)]
pub struct ChecksumCache {
    entries: RefCell<HashMap<ObjectKey, Rc<ObjectChecksums>>>,
}

impl ChecksumCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current checksums of an object, or `None` if the site
    /// has no such object.
    pub fn checksums_for(
        &self,
        site: &Site,
        key: &ObjectKey,
    ) -> Result<Option<Rc<ObjectChecksums>>, ChecksumError> {
        if let Some(cached) = self.entries.borrow().get(key) {
            return Ok(Some(Rc::clone(cached)));
        }
        let computed = match key {
            ObjectKey::Item(id) => match site.items.get(id) {
                Some(item) => ObjectChecksums::of_document(item)?,
                None => return Ok(None),
            },
            ObjectKey::Layout(id) => match site.layouts.get(id) {
                Some(layout) => ObjectChecksums::of_document(layout)?,
                None => return Ok(None),
            },
            ObjectKey::Config => ObjectChecksums::of_config(&site.config)?,
            ObjectKey::CodeSnippets => ObjectChecksums::of_code_snippets(&site.code_snippets)?,
        };
        tracing::trace!(object = %key, whole = %computed.whole, "computed checksums");
        let computed = Rc::new(computed);
        self.entries
            .borrow_mut()
            .insert(key.clone(), Rc::clone(&computed));
        Ok(Some(computed))
    }

    /// Returns the checksums of every object in the site.
    pub fn all(&self, site: &Site) -> Result<BTreeMap<ObjectKey, ObjectChecksums>, ChecksumError> {
        let keys = site
            .items
            .identifiers()
            .cloned()
            .map(ObjectKey::Item)
            .chain(site.layouts.identifiers().cloned().map(ObjectKey::Layout))
            .chain([ObjectKey::Config, ObjectKey::CodeSnippets]);
        let mut out = BTreeMap::new();
        for key in keys {
            if let Some(sums) = self.checksums_for(site, &key)? {
                out.insert(key, (*sums).clone());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_model::{Attributes, Item, Layout, Value};

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn site(title: &str) -> Site {
        let mut attrs = Attributes::new();
        attrs.insert("title".to_string(), Value::from(title));
        attrs.insert("kind".to_string(), Value::from("page"));
        Site::new(
            Configuration::new("/site", BTreeMap::new()).with_defaults(),
            vec![Item::new("hello", attrs, id("/a.md"))],
            vec![Layout::new("<html/>", Attributes::new(), id("/default.html"))],
            vec![CodeSnippet::new("helpers", "lib/helpers.rs")],
        )
        .unwrap()
    }

    #[test]
    fn key_string_roundtrip() {
        for key in [
            ObjectKey::Item(id("/a.md")),
            ObjectKey::Layout(id("/default.html")),
            ObjectKey::Config,
            ObjectKey::CodeSnippets,
        ] {
            let s = key.to_string();
            assert_eq!(s.parse::<ObjectKey>().unwrap(), key);
        }
        assert!("bogus".parse::<ObjectKey>().is_err());
        assert!("item:nope".parse::<ObjectKey>().is_err());
    }

    #[test]
    fn key_as_json_map_key() {
        let mut map = BTreeMap::new();
        map.insert(ObjectKey::Item(id("/a.md")), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"item:/a.md":1}"#);
    }

    #[test]
    fn missing_object_is_none() {
        let cache = ChecksumCache::new();
        let site = site("A");
        assert!(cache
            .checksums_for(&site, &ObjectKey::Item(id("/missing.md")))
            .unwrap()
            .is_none());
    }

    #[test]
    fn document_checksums_split_content_and_attributes() {
        let cache = ChecksumCache::new();
        let a = site("A");
        let b = site("B");
        let key = ObjectKey::Item(id("/a.md"));
        let sa = cache.checksums_for(&a, &key).unwrap().unwrap();
        let sb = ChecksumCache::new().checksums_for(&b, &key).unwrap().unwrap();
        assert_eq!(sa.content, sb.content);
        assert_ne!(sa.whole, sb.whole);
        assert_eq!(sb.changed_attributes(&sa), vec!["title".to_string()]);
    }

    #[test]
    fn changed_attributes_added_and_removed() {
        let mut old = Attributes::new();
        old.insert("gone".to_string(), Value::from(1i64));
        old.insert("same".to_string(), Value::from(1i64));
        let mut new = Attributes::new();
        new.insert("added".to_string(), Value::from(1i64));
        new.insert("same".to_string(), Value::from(1i64));
        let before = ObjectChecksums::of_document(&Item::new("", old, id("/a.md"))).unwrap();
        let after = ObjectChecksums::of_document(&Item::new("", new, id("/a.md"))).unwrap();
        assert_eq!(after.changed_attributes(&before), vec!["added", "gone"]);
    }

    #[test]
    fn all_covers_every_object() {
        let cache = ChecksumCache::new();
        let all = cache.all(&site("A")).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.contains_key(&ObjectKey::Config));
        assert!(all.contains_key(&ObjectKey::CodeSnippets));
        assert!(all[&ObjectKey::Config].attributes.contains_key("output_dir"));
    }
}
