//! Compilation plans.
//!
//! The action recorder turns the matching rule of a rep into a fully
//! resolved [`ActionSequence`]: layouts are checked, implicit snapshots are
//! inserted and output paths are computed. It runs no filters, so a plan can
//! be built and checksummed before anything is compiled.

use std::path::{Path, PathBuf};

use kiln_checksum::{ChecksumError, Checksummable, DigestSink};
use kiln_common::Identifier;
use kiln_model::{ItemRep, Site};

use crate::error::CompileError;
use crate::filter::FilterRegistry;
use crate::rules::{expand_path, Params, RuleSet, Step};

/// Snapshot of the content before any step.
pub const RAW: &str = "raw";
/// Snapshot of the content before the first layout.
pub const PRE: &str = "pre";
/// Snapshot of the content after the last step.
pub const POST: &str = "post";
/// Snapshot of the final content; the one a rule writes.
pub const LAST: &str = "last";

/// One resolved step of a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Run a filter over the current content.
    Filter {
        /// Registered filter name.
        name: String,
        /// Filter parameters.
        params: Params,
    },
    /// Run a layout's filter over the layout, yielding the current content.
    Layout {
        /// The layout.
        identifier: Identifier,
        /// Filter named by the matching layout rule.
        filter: String,
        /// Layout rule parameters merged with the step's.
        params: Params,
    },
    /// Keep a named copy of the current content.
    Snapshot {
        /// Snapshot name.
        name: String,
        /// Output path relative to the output directory.
        path: Option<PathBuf>,
    },
}

impl Action {
    /// Short description used in errors and logs.
    pub fn describe(&self) -> String {
        match self {
            Action::Filter { name, .. } => format!("filter '{name}'"),
            Action::Layout { identifier, .. } => format!("layout {identifier}"),
            Action::Snapshot { name, .. } => format!("snapshot '{name}'"),
        }
    }
}

/// The resolved plan of one rep.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSequence {
    actions: Vec<Action>,
}

impl ActionSequence {
    /// The actions, in execution order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Paths written by the plan, relative to the output directory.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.snapshots_with_paths()
            .map(|(_, path)| path.to_path_buf())
            .collect()
    }

    /// Snapshots that are written, with their paths.
    pub fn snapshots_with_paths(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.actions.iter().filter_map(|action| match action {
            Action::Snapshot {
                name,
                path: Some(path),
            } => Some((name.as_str(), path.as_path())),
            _ => None,
        })
    }

    /// The path of the `last` snapshot, if written.
    pub fn output_path(&self) -> Option<&Path> {
        self.snapshots_with_paths()
            .find(|(name, _)| *name == LAST)
            .map(|(_, path)| path)
    }

    /// Names of every filter the plan runs, including layout filters.
    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|action| match action {
            Action::Filter { name, .. } => Some(name.as_str()),
            Action::Layout { filter, .. } => Some(filter.as_str()),
            Action::Snapshot { .. } => None,
        })
    }
}

fn update_path<S: DigestSink>(sink: &mut S, path: Option<&Path>) -> Result<(), ChecksumError> {
    match path {
        Some(path) => path.to_string_lossy().update(sink),
        None => sink.tagged("Null", |_| Ok(())),
    }
}

impl Checksummable for Action {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        match self {
            Action::Filter { name, params } => sink.tagged("Filter", |sink| {
                sink.field("name", name)?;
                sink.write_str(",");
                sink.field("params", params)
            }),
            Action::Layout {
                identifier,
                filter,
                params,
            } => sink.tagged("Layout", |sink| {
                sink.field("identifier", identifier)?;
                sink.write_str(",");
                sink.field("filter", filter)?;
                sink.write_str(",");
                sink.field("params", params)
            }),
            Action::Snapshot { name, path } => sink.tagged("Snapshot", |sink| {
                sink.field("name", name)?;
                sink.write_str(",path=");
                update_path(sink, path.as_deref())
            }),
        }
    }
}

/// Identical plans of different items checksum identically.
impl Checksummable for ActionSequence {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.tagged("Rule", |sink| sink.sequence("Array", &self.actions))
    }
}

/// Builds plans from rules.
pub struct ActionRecorder<'a> {
    site: &'a Site,
    rules: &'a RuleSet,
    filters: &'a FilterRegistry,
}

impl<'a> ActionRecorder<'a> {
    /// Creates a recorder.
    pub fn new(site: &'a Site, rules: &'a RuleSet, filters: &'a FilterRegistry) -> Self {
        Self {
            site,
            rules,
            filters,
        }
    }

    /// Resolves the plan of a rep.
    pub fn plan(&self, rep: &ItemRep) -> Result<ActionSequence, CompileError> {
        let rule =
            self.rules
                .rule_for(&rep.item, &rep.name)
                .ok_or_else(|| CompileError::NoMatchingRule {
                    item: rep.item.clone(),
                })?;

        let mut actions = vec![Action::Snapshot {
            name: RAW.to_string(),
            path: None,
        }];
        let mut has_pre = rule
            .steps
            .iter()
            .any(|s| matches!(s, Step::Snapshot { name, .. } if name == PRE));

        for step in &rule.steps {
            match step {
                Step::Filter { name, params } => {
                    self.check_filter(rep, name)?;
                    actions.push(Action::Filter {
                        name: name.clone(),
                        params: params.clone(),
                    });
                }
                Step::Layout { identifier, params } => {
                    if !self.site.layouts.contains(identifier) {
                        return Err(CompileError::NoSuchLayout {
                            rep: rep.clone(),
                            layout: identifier.clone(),
                        });
                    }
                    let layout_rule = self.rules.layout_rule_for(identifier).ok_or_else(|| {
                        CompileError::NoMatchingLayoutRule {
                            layout: identifier.clone(),
                        }
                    })?;
                    self.check_filter(rep, &layout_rule.filter)?;
                    if !has_pre {
                        actions.push(Action::Snapshot {
                            name: PRE.to_string(),
                            path: None,
                        });
                        has_pre = true;
                    }
                    let mut merged = layout_rule.params.clone();
                    merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
                    actions.push(Action::Layout {
                        identifier: identifier.clone(),
                        filter: layout_rule.filter.clone(),
                        params: merged,
                    });
                }
                Step::Snapshot { name, path } => actions.push(Action::Snapshot {
                    name: name.clone(),
                    path: path.as_deref().map(|p| expand_path(p, &rep.item)),
                }),
            }
        }

        let declared = |wanted: &str| {
            actions
                .iter()
                .any(|a| matches!(a, Action::Snapshot { name, .. } if name == wanted))
        };
        let mut tail = Vec::new();
        if !has_pre {
            tail.push((PRE, None));
        }
        if !declared(POST) {
            tail.push((POST, None));
        }
        if !declared(LAST) {
            tail.push((LAST, rule.write.resolve(&rep.item)));
        }
        actions.extend(tail.into_iter().map(|(name, path)| Action::Snapshot {
            name: name.to_string(),
            path,
        }));

        Ok(ActionSequence { actions })
    }

    fn check_filter(&self, rep: &ItemRep, name: &str) -> Result<(), CompileError> {
        if self.filters.contains(name) {
            Ok(())
        } else {
            Err(CompileError::UnknownFilter {
                rep: rep.clone(),
                filter: name.to_string(),
            })
        }
    }
}
