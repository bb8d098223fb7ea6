//! Site-wide configuration values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_common::{PatternError, PatternKind};

use crate::value::Value;

/// Key of the output directory setting.
pub const OUTPUT_DIR: &str = "output_dir";
/// Key of the directory index filenames setting.
pub const INDEX_FILENAMES: &str = "index_filenames";
/// Key of the pattern flavour setting.
pub const STRING_PATTERN_TYPE: &str = "string_pattern_type";
/// Key of the list of extensions treated as text.
pub const TEXT_EXTENSIONS: &str = "text_extensions";
/// Key of the failure persistence setting.
pub const PERSIST_PROGRESS_ON_FAILURE: &str = "persist_progress_on_failure";

/// Default extensions treated as textual content.
const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    "adoc", "asciidoc", "atom", "coffee", "css", "erb", "haml", "handlebars", "hb", "htm", "html",
    "js", "less", "markdown", "md", "ms", "mustache", "php", "rb", "rdoc", "sass", "scss", "slim",
    "tex", "toml", "txt", "xhtml", "xml", "yaml", "yml",
];

/// Site configuration: a flat map from keys to values.
///
/// The configuration is a single node in the dependency graph. Its checksum
/// covers the entries only, not the site directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    dir: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl Configuration {
    /// Creates a configuration rooted at `dir` with exactly the given entries.
    pub fn new(dir: impl Into<PathBuf>, entries: BTreeMap<String, Value>) -> Self {
        Self {
            dir: dir.into(),
            entries,
        }
    }

    /// Fills in defaults for every well-known key that is not set.
    pub fn with_defaults(mut self) -> Self {
        let defaults: [(&str, Value); 5] = [
            (OUTPUT_DIR, Value::from("output")),
            (INDEX_FILENAMES, Value::from(vec!["index.html"])),
            (STRING_PATTERN_TYPE, Value::from("glob")),
            (TEXT_EXTENSIONS, Value::from(DEFAULT_TEXT_EXTENSIONS.to_vec())),
            (PERSIST_PROGRESS_ON_FAILURE, Value::from(false)),
        ];
        for (key, value) in defaults {
            self.entries.entry(key.to_string()).or_insert(value);
        }
        self
    }

    /// The site root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Looks up a configuration entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Returns the entries.
    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    /// The output directory, resolved against the site directory.
    pub fn output_dir(&self) -> PathBuf {
        let rel = self
            .get(OUTPUT_DIR)
            .and_then(Value::as_str)
            .unwrap_or("output");
        self.dir.join(rel)
    }

    /// Filenames that act as directory indexes.
    pub fn index_filenames(&self) -> Vec<String> {
        self.string_list(INDEX_FILENAMES)
    }

    /// Extensions of files treated as textual content.
    pub fn text_extensions(&self) -> Vec<String> {
        self.string_list(TEXT_EXTENSIONS)
    }

    /// The pattern flavour used for identifier matching.
    pub fn pattern_kind(&self) -> Result<PatternKind, PatternError> {
        match self.get(STRING_PATTERN_TYPE).and_then(Value::as_str) {
            Some(s) => s.parse(),
            None => Ok(PatternKind::default()),
        }
    }

    /// Whether a failed run flushes the progress made so far.
    pub fn persist_progress_on_failure(&self) -> bool {
        self.get(PERSIST_PROGRESS_ON_FAILURE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let config = Configuration::new("/site", BTreeMap::new()).with_defaults();
        assert_eq!(config.output_dir(), PathBuf::from("/site/output"));
        assert_eq!(config.index_filenames(), vec!["index.html"]);
        assert_eq!(config.pattern_kind().unwrap(), PatternKind::Glob);
        assert!(config.text_extensions().contains(&"md".to_string()));
        assert!(!config.persist_progress_on_failure());
    }

    #[test]
    fn defaults_do_not_override() {
        let mut entries = BTreeMap::new();
        entries.insert(OUTPUT_DIR.to_string(), Value::from("public"));
        let config = Configuration::new("/site", entries).with_defaults();
        assert_eq!(config.output_dir(), PathBuf::from("/site/public"));
    }

    #[test]
    fn legacy_pattern_kind() {
        let mut entries = BTreeMap::new();
        entries.insert(STRING_PATTERN_TYPE.to_string(), Value::from("legacy"));
        let config = Configuration::new("/site", entries);
        assert_eq!(config.pattern_kind().unwrap(), PatternKind::Legacy);
    }

    #[test]
    fn unknown_pattern_kind_errors() {
        let mut entries = BTreeMap::new();
        entries.insert(STRING_PATTERN_TYPE.to_string(), Value::from("regex"));
        let config = Configuration::new("/site", entries);
        assert!(config.pattern_kind().is_err());
    }
}
