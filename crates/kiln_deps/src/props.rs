//! Which aspects of a dependency target were used.

use serde::{Deserialize, Serialize};

/// Whether one aspect of a target was used, and how narrowly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropValue {
    /// The aspect was not used.
    #[default]
    Off,
    /// The aspect was used in full.
    Any,
    /// Only the listed attribute keys (document and config targets) or the
    /// members matching the listed identifier patterns (collection targets)
    /// were used.
    Matching(Vec<String>),
}

impl PropValue {
    /// Builds a `Matching` value from a list of keys or patterns.
    pub fn matching<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PropValue::Matching(entries.into_iter().map(Into::into).collect())
    }

    /// Returns `true` unless the value is `Off`.
    pub fn is_active(&self) -> bool {
        !matches!(self, PropValue::Off)
    }

    /// Returns `true` if the given attribute key is covered.
    pub fn covers_key(&self, key: &str) -> bool {
        match self {
            PropValue::Off => false,
            PropValue::Any => true,
            PropValue::Matching(keys) => keys.iter().any(|k| k == key),
        }
    }

    /// Merges another value into this one.
    ///
    /// `Off` is the identity and `Any` absorbs everything; two lists are
    /// concatenated without duplicates, keeping first-seen order.
    pub fn union(&mut self, other: &PropValue) {
        match other {
            PropValue::Off => {}
            PropValue::Any => *self = PropValue::Any,
            PropValue::Matching(theirs) => match self {
                PropValue::Any => {}
                PropValue::Off => *self = other.clone(),
                PropValue::Matching(mine) => {
                    for entry in theirs {
                        if !mine.contains(entry) {
                            mine.push(entry.clone());
                        }
                    }
                }
            },
        }
    }
}

impl From<bool> for PropValue {
    fn from(active: bool) -> Self {
        if active {
            PropValue::Any
        } else {
            PropValue::Off
        }
    }
}

/// The four aspects a dependency can cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySet {
    /// The raw (uncompiled) content.
    pub raw_content: PropValue,
    /// The attributes.
    pub attributes: PropValue,
    /// The compiled content of any rep.
    pub compiled_content: PropValue,
    /// The output path of any rep.
    pub path: PropValue,
}

impl PropertySet {
    /// A set with every aspect off. Recording it is the same as recording
    /// [`PropertySet::all`].
    pub fn none() -> Self {
        Self::default()
    }

    /// A set with every aspect fully used.
    pub fn all() -> Self {
        Self {
            raw_content: PropValue::Any,
            attributes: PropValue::Any,
            compiled_content: PropValue::Any,
            path: PropValue::Any,
        }
    }

    /// Sets the raw content aspect.
    pub fn raw_content(mut self, value: impl Into<PropValue>) -> Self {
        self.raw_content = value.into();
        self
    }

    /// Sets the attributes aspect.
    pub fn attributes(mut self, value: impl Into<PropValue>) -> Self {
        self.attributes = value.into();
        self
    }

    /// Sets the compiled content aspect.
    pub fn compiled_content(mut self, value: impl Into<PropValue>) -> Self {
        self.compiled_content = value.into();
        self
    }

    /// Sets the path aspect.
    pub fn path(mut self, value: impl Into<PropValue>) -> Self {
        self.path = value.into();
        self
    }

    /// Returns `true` if no aspect is active.
    pub fn is_empty(&self) -> bool {
        self.values().iter().all(|v| !v.is_active())
    }

    /// Merges another set into this one, aspect by aspect.
    pub fn union(&mut self, other: &PropertySet) {
        self.raw_content.union(&other.raw_content);
        self.attributes.union(&other.attributes);
        self.compiled_content.union(&other.compiled_content);
        self.path.union(&other.path);
    }

    /// The four-letter activity code, e.g. `ra__`.
    pub fn code(&self) -> String {
        self.values()
            .iter()
            .zip(['r', 'a', 'c', 'p'])
            .map(|(v, letter)| if v.is_active() { letter } else { '_' })
            .collect()
    }

    /// All entries of every `Matching` aspect, deduplicated, in aspect order.
    pub fn matching_entries(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for value in self.values() {
            if let PropValue::Matching(entries) = value {
                for entry in entries {
                    if !out.contains(&entry.as_str()) {
                        out.push(entry);
                    }
                }
            }
        }
        out
    }

    fn values(&self) -> [&PropValue; 4] {
        [
            &self.raw_content,
            &self.attributes,
            &self.compiled_content,
            &self.path,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_identity_and_absorption() {
        let mut v = PropValue::Off;
        v.union(&PropValue::matching(["a"]));
        assert_eq!(v, PropValue::matching(["a"]));

        v.union(&PropValue::Off);
        assert_eq!(v, PropValue::matching(["a"]));

        v.union(&PropValue::Any);
        assert_eq!(v, PropValue::Any);

        v.union(&PropValue::matching(["b"]));
        assert_eq!(v, PropValue::Any);
    }

    #[test]
    fn union_of_lists_keeps_order_without_duplicates() {
        let mut v = PropValue::matching(["/about.*", "/dog.*"]);
        v.union(&PropValue::matching(["/giraffe.*", "/about.*"]));
        assert_eq!(v, PropValue::matching(["/about.*", "/dog.*", "/giraffe.*"]));
    }

    #[test]
    fn covers_key() {
        assert!(PropValue::Any.covers_key("title"));
        assert!(!PropValue::Off.covers_key("title"));
        assert!(PropValue::matching(["title"]).covers_key("title"));
        assert!(!PropValue::matching(["title"]).covers_key("author"));
    }

    #[test]
    fn codes() {
        assert_eq!(PropertySet::all().code(), "racp");
        assert_eq!(PropertySet::none().code(), "____");
        assert_eq!(
            PropertySet::none().raw_content(true).attributes(true).code(),
            "ra__"
        );
        assert_eq!(
            PropertySet::none()
                .attributes(PropValue::matching(["title"]))
                .code(),
            "_a__"
        );
    }

    #[test]
    fn set_union() {
        let mut set = PropertySet::none().raw_content(true);
        set.union(&PropertySet::none().attributes(true));
        assert_eq!(set.code(), "ra__");
        assert!(!set.is_empty());
        assert!(PropertySet::none().is_empty());
    }

    #[test]
    fn matching_entries_deduplicated() {
        let set = PropertySet::none()
            .raw_content(PropValue::matching(["/a.*"]))
            .attributes(PropValue::matching(["/a.*", "/b.*"]));
        assert_eq!(set.matching_entries(), vec!["/a.*", "/b.*"]);
    }
}
