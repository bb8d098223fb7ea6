//! Rule descriptions deserialized from `rules.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;

use kiln_model::Value;

/// The parsed contents of `rules.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    /// Compile rules, in priority order.
    #[serde(default)]
    pub compile: Vec<CompileRuleSpec>,
    /// Layout rules, in priority order.
    #[serde(default)]
    pub layout: Vec<LayoutRuleSpec>,
}

/// How items matching a pattern are compiled into one rep.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileRuleSpec {
    /// Identifier pattern selecting the items.
    pub pattern: String,
    /// Name of the rep this rule produces.
    #[serde(default = "default_rep")]
    pub rep: String,
    /// Pipeline steps, in order.
    #[serde(default)]
    pub steps: Vec<StepSpec>,
    /// Where the final content is written; omitted for none.
    #[serde(default)]
    pub write: Option<WriteSpec>,
}

fn default_rep() -> String {
    "default".to_string()
}

/// One pipeline step.
///
/// Written as an inline table with exactly one of `filter`, `layout` or
/// `snapshot`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StepSpec {
    /// Run a filter over the content.
    Filter {
        /// Registered filter name.
        filter: String,
        /// Filter parameters.
        #[serde(default)]
        params: BTreeMap<String, Value>,
    },
    /// Lay the content out with a layout.
    Layout {
        /// Layout identifier.
        layout: String,
        /// Parameters for the layout's filter.
        #[serde(default)]
        params: BTreeMap<String, Value>,
    },
    /// Keep a named copy of the content, optionally writing it.
    Snapshot {
        /// Snapshot name.
        snapshot: String,
        /// Output path, relative to the output directory.
        #[serde(default)]
        path: Option<String>,
    },
}

/// Where a rep's final content is written.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WriteSpec {
    /// The identifier with its extension replaced.
    Ext {
        /// The new extension, without a dot.
        ext: String,
    },
    /// A path template with `{identifier}`, `{without_ext}` and `{ext}`.
    Path {
        /// The template.
        path: String,
    },
}

/// Which filter lays out content with layouts matching a pattern.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutRuleSpec {
    /// Layout identifier pattern.
    pub pattern: String,
    /// Registered filter name.
    pub filter: String,
    /// Default filter parameters.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}
