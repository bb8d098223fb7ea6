//! Compile and layout rules.
//!
//! Rules are plain data loaded from `rules.toml`. For every item, each
//! distinct rep name is produced by the first rule with that name whose
//! pattern matches the item.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use kiln_common::{Identifier, Pattern, PatternKind};
use kiln_config::{CompileRuleSpec, LayoutRuleSpec, RulesFile, StepSpec, WriteSpec};
use kiln_model::{RepName, Value};

use crate::error::CompileError;

/// Filter parameters.
pub type Params = BTreeMap<String, Value>;

/// One step of a compile rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Run a filter over the current content.
    Filter {
        /// Registered filter name.
        name: String,
        /// Filter parameters.
        params: Params,
    },
    /// Lay the current content out with a layout.
    Layout {
        /// The layout.
        identifier: Identifier,
        /// Parameters overriding the layout rule's.
        params: Params,
    },
    /// Keep a named copy of the current content.
    Snapshot {
        /// Snapshot name.
        name: String,
        /// Output path template, if the snapshot is written.
        path: Option<String>,
    },
}

/// Where the final content of a rep is written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WriteTarget {
    /// The rep is not written.
    #[default]
    None,
    /// The identifier without its extension, plus this extension.
    Ext(String),
    /// A path template.
    Path(String),
}

impl WriteTarget {
    /// Resolves the output path of an item, relative to the output directory.
    pub fn resolve(&self, item: &Identifier) -> Option<PathBuf> {
        match self {
            WriteTarget::None => None,
            WriteTarget::Ext(ext) => Some(relative(&format!("{}.{ext}", item.without_ext()))),
            WriteTarget::Path(template) => Some(expand_path(template, item)),
        }
    }
}

/// Substitutes `{identifier}`, `{without_ext}` and `{ext}` in a path
/// template and makes the result relative to the output directory.
pub fn expand_path(template: &str, item: &Identifier) -> PathBuf {
    let expanded = template
        .replace("{identifier}", item.as_str())
        .replace("{without_ext}", item.without_ext())
        .replace("{ext}", item.ext().unwrap_or(""));
    relative(&expanded)
}

fn relative(path: &str) -> PathBuf {
    PathBuf::from(path.trim_start_matches('/'))
}

/// How items matching a pattern are compiled into one rep.
#[derive(Debug, Clone)]
pub struct CompileRule {
    /// Items the rule applies to.
    pub pattern: Pattern,
    /// The rep the rule produces.
    pub rep: RepName,
    /// Pipeline steps.
    pub steps: Vec<Step>,
    /// Where the result goes.
    pub write: WriteTarget,
}

impl CompileRule {
    /// Creates a rule for the `default` rep with no steps.
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            rep: RepName::default_name(),
            steps: Vec::new(),
            write: WriteTarget::None,
        }
    }

    /// Sets the rep name.
    pub fn rep(mut self, name: impl Into<String>) -> Self {
        self.rep = RepName::new(name);
        self
    }

    /// Appends a filter step without parameters.
    pub fn filter(self, name: impl Into<String>) -> Self {
        self.filter_with(name, Params::new())
    }

    /// Appends a filter step.
    pub fn filter_with(mut self, name: impl Into<String>, params: Params) -> Self {
        self.steps.push(Step::Filter {
            name: name.into(),
            params,
        });
        self
    }

    /// Appends a layout step.
    pub fn layout(mut self, identifier: Identifier) -> Self {
        self.steps.push(Step::Layout {
            identifier,
            params: Params::new(),
        });
        self
    }

    /// Appends a snapshot step.
    pub fn snapshot(mut self, name: impl Into<String>, path: Option<&str>) -> Self {
        self.steps.push(Step::Snapshot {
            name: name.into(),
            path: path.map(str::to_string),
        });
        self
    }

    /// Sets the write target.
    pub fn write(mut self, write: WriteTarget) -> Self {
        self.write = write;
        self
    }

    fn from_entry(entry: &CompileRuleSpec, kind: PatternKind) -> Result<Self, CompileError> {
        let mut rule = CompileRule::new(Pattern::with_kind(&entry.pattern, kind)?).rep(&entry.rep);
        for step in &entry.steps {
            rule.steps.push(match step {
                StepSpec::Filter { filter, params } => Step::Filter {
                    name: filter.clone(),
                    params: params.clone(),
                },
                StepSpec::Layout { layout, params } => Step::Layout {
                    identifier: Identifier::new(layout.as_str())
                        .map_err(kiln_model::ModelError::from)?,
                    params: params.clone(),
                },
                StepSpec::Snapshot { snapshot, path } => Step::Snapshot {
                    name: snapshot.clone(),
                    path: path.clone(),
                },
            });
        }
        rule.write = match &entry.write {
            None => WriteTarget::None,
            Some(WriteSpec::Ext { ext }) => WriteTarget::Ext(ext.clone()),
            Some(WriteSpec::Path { path }) => WriteTarget::Path(path.clone()),
        };
        Ok(rule)
    }
}

/// Which filter applies layouts matching a pattern.
#[derive(Debug, Clone)]
pub struct LayoutRule {
    /// Layouts the rule applies to.
    pub pattern: Pattern,
    /// Registered filter name.
    pub filter: String,
    /// Default parameters.
    pub params: Params,
}

impl LayoutRule {
    /// Creates a layout rule without parameters.
    pub fn new(pattern: Pattern, filter: impl Into<String>) -> Self {
        Self {
            pattern,
            filter: filter.into(),
            params: Params::new(),
        }
    }

    fn from_entry(entry: &LayoutRuleSpec, kind: PatternKind) -> Result<Self, CompileError> {
        Ok(Self {
            pattern: Pattern::with_kind(&entry.pattern, kind)?,
            filter: entry.filter.clone(),
            params: entry.params.clone(),
        })
    }
}

/// The ordered compile and layout rules of a site.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    compile: Vec<CompileRule>,
    layout: Vec<LayoutRule>,
}

impl RuleSet {
    /// Creates a rule set.
    pub fn new(compile: Vec<CompileRule>, layout: Vec<LayoutRule>) -> Self {
        Self { compile, layout }
    }

    /// Builds a rule set from a parsed rules file.
    pub fn from_file(file: &RulesFile, kind: PatternKind) -> Result<Self, CompileError> {
        let compile = file
            .compile
            .iter()
            .map(|entry| CompileRule::from_entry(entry, kind))
            .collect::<Result<_, _>>()?;
        let layout = file
            .layout
            .iter()
            .map(|entry| LayoutRule::from_entry(entry, kind))
            .collect::<Result<_, _>>()?;
        Ok(Self::new(compile, layout))
    }

    /// The rules producing the reps of an item, in rule order. Only the
    /// first matching rule of each rep name counts.
    pub fn rules_for(&self, item: &Identifier) -> Vec<&CompileRule> {
        let mut seen = HashSet::new();
        self.compile
            .iter()
            .filter(|rule| rule.pattern.matches(item))
            .filter(|rule| seen.insert(&rule.rep))
            .collect()
    }

    /// The rule producing one rep of an item.
    pub fn rule_for(&self, item: &Identifier, rep: &RepName) -> Option<&CompileRule> {
        self.compile
            .iter()
            .find(|rule| &rule.rep == rep && rule.pattern.matches(item))
    }

    /// The first layout rule matching a layout.
    pub fn layout_rule_for(&self, layout: &Identifier) -> Option<&LayoutRule> {
        self.layout.iter().find(|rule| rule.pattern.matches(layout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn pat(s: &str) -> Pattern {
        Pattern::new(s).unwrap()
    }

    #[test]
    fn first_rule_per_rep_wins() {
        let rules = RuleSet::new(
            vec![
                CompileRule::new(pat("/special.md")).filter("trim"),
                CompileRule::new(pat("/*.md")).filter("template"),
                CompileRule::new(pat("/*.md")).rep("raw"),
            ],
            vec![],
        );
        let matched = rules.rules_for(&id("/special.md"));
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].steps.len(), 1);
        assert!(matches!(&matched[0].steps[0], Step::Filter { name, .. } if name == "trim"));
        assert_eq!(matched[1].rep, RepName::new("raw"));
        assert!(rules.rules_for(&id("/style.css")).is_empty());
    }

    #[test]
    fn write_targets() {
        let item = id("/blog/post.md");
        assert_eq!(WriteTarget::None.resolve(&item), None);
        assert_eq!(
            WriteTarget::Ext("html".into()).resolve(&item),
            Some(PathBuf::from("blog/post.html"))
        );
        assert_eq!(
            WriteTarget::Path("{without_ext}/index.html".into()).resolve(&item),
            Some(PathBuf::from("blog/post/index.html"))
        );
        assert_eq!(
            WriteTarget::Path("/raw{identifier}.{ext}".into()).resolve(&item),
            Some(PathBuf::from("raw/blog/post.md.md"))
        );
    }

    #[test]
    fn from_rules_file() {
        let file = kiln_config::load_rules_from_str(
            r#"
[[compile]]
pattern = "/**/*.md"
steps = [{ filter = "template" }, { layout = "/default.html" }, { snapshot = "pre2" }]
write = { ext = "html" }

[[layout]]
pattern = "/**/*"
filter = "template"
"#,
            PatternKind::Glob,
        )
        .unwrap();
        let rules = RuleSet::from_file(&file, PatternKind::Glob).unwrap();
        let rule = rules.rule_for(&id("/a.md"), &RepName::default_name()).unwrap();
        assert_eq!(rule.steps.len(), 3);
        assert_eq!(rule.write, WriteTarget::Ext("html".into()));
        assert_eq!(
            rules.layout_rule_for(&id("/default.html")).unwrap().filter,
            "template"
        );
    }

    #[test]
    fn legacy_patterns() {
        let file = kiln_config::load_rules_from_str(
            "[[compile]]\npattern = \"/blog/*\"\n",
            PatternKind::Legacy,
        )
        .unwrap();
        let rules = RuleSet::from_file(&file, PatternKind::Legacy).unwrap();
        assert_eq!(rules.rules_for(&id("/blog/2024/a.md")).len(), 1);
    }
}
