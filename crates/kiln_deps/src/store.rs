//! The dependency store and its persisted table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kiln_common::Identifier;
use kiln_model::Site;
use serde::{Deserialize, Serialize};

use crate::props::PropertySet;
use crate::target::{DependencyTarget, Dependent};

/// One recorded edge: the target and the aspects of it that were used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// What was depended on.
    pub target: DependencyTarget,
    /// Which aspects of the target were used.
    pub props: PropertySet,
}

/// Renders the diagnostic line used by `show-data`, e.g.
/// `[    item ] (ra__) /about.md`.
impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>8} ] ({}) ",
            self.target.kind_label(),
            self.props.code()
        )?;
        match &self.target {
            DependencyTarget::Item(id) | DependencyTarget::Layout(id) => write!(f, "{id}"),
            DependencyTarget::Config => Ok(()),
            DependencyTarget::Items | DependencyTarget::Layouts => {
                let patterns = self.props.matching_entries();
                if patterns.is_empty() {
                    f.write_str("matching any")
                } else {
                    write!(f, "matching any of {}", patterns.join(", "))
                }
            }
        }
    }
}

/// Whether a dependency target still exists in the current site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// The target exists (always the case for config and collections).
    Present,
    /// The single-document target no longer exists.
    Removed,
}

/// A recorded edge resolved against the current site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency<'a> {
    /// The recorded edge.
    pub edge: &'a DependencyEdge,
    /// The state of the target in the current site.
    pub state: TargetState,
}

/// Identifiers of all items and layouts in a site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownIdentifiers {
    /// Item identifiers.
    pub items: BTreeSet<Identifier>,
    /// Layout identifiers.
    pub layouts: BTreeSet<Identifier>,
}

impl KnownIdentifiers {
    /// Collects the identifiers of a site.
    pub fn of_site(site: &Site) -> Self {
        Self {
            items: site.items.identifiers().cloned().collect(),
            layouts: site.layouts.identifiers().cloned().collect(),
        }
    }
}

/// All edges of all dependents, as persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyTable {
    edges: BTreeMap<Dependent, Vec<DependencyEdge>>,
}

impl DependencyTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over every dependent with at least one edge.
    pub fn iter(&self) -> impl Iterator<Item = (&Dependent, &[DependencyEdge])> {
        self.edges.iter().map(|(d, e)| (d, e.as_slice()))
    }

    /// Returns `true` if no edges are recorded.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Records and answers queries about dependency edges for one run.
///
/// Starts from the table persisted by the previous run. Edges of a dependent
/// are kept in first-recorded order; recording the same (dependent, target)
/// pair again merges the property sets.
#[derive(Debug, Clone)]
pub struct DependencyStore {
    table: DependencyTable,
    previous: KnownIdentifiers,
    current: KnownIdentifiers,
}

impl DependencyStore {
    /// Creates an empty store for a site seen for the first time.
    pub fn new(current: KnownIdentifiers) -> Self {
        Self::load(DependencyTable::new(), KnownIdentifiers::default(), current)
    }

    /// Restores a store from the previous run's table and identifiers.
    pub fn load(
        table: DependencyTable,
        previous: KnownIdentifiers,
        current: KnownIdentifiers,
    ) -> Self {
        Self {
            table,
            previous,
            current,
        }
    }

    /// Records that `from` used the given aspects of `on`.
    ///
    /// An empty property set records every aspect.
    pub fn record_dependency(&mut self, from: &Dependent, on: DependencyTarget, props: PropertySet) {
        let props = if props.is_empty() {
            PropertySet::all()
        } else {
            props
        };
        tracing::trace!(from = %from, on = on.kind_label(), props = %props.code(), "record dependency");
        let edges = self.table.edges.entry(from.clone()).or_default();
        match edges.iter_mut().find(|e| e.target == on) {
            Some(existing) => existing.props.union(&props),
            None => edges.push(DependencyEdge { target: on, props }),
        }
    }

    /// Returns the edges of `from`, each annotated with the state of its
    /// target in the current site.
    pub fn dependencies_of(&self, from: &Dependent) -> Vec<Dependency<'_>> {
        self.raw_dependencies_of(from)
            .iter()
            .map(|edge| Dependency {
                edge,
                state: self.state_of(&edge.target),
            })
            .collect()
    }

    /// Returns the edges of `from` as recorded.
    pub fn raw_dependencies_of(&self, from: &Dependent) -> &[DependencyEdge] {
        self.table
            .edges
            .get(from)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Drops every edge of `from`, ahead of recompiling it.
    pub fn forget_dependencies_for(&mut self, from: &Dependent) {
        if self.table.edges.remove(from).is_some() {
            tracing::debug!(dependent = %from, "forgot dependencies");
        }
    }

    /// Items present now that were not present in the previous run.
    pub fn new_items(&self) -> Vec<&Identifier> {
        self.current
            .items
            .difference(&self.previous.items)
            .collect()
    }

    /// Layouts present now that were not present in the previous run.
    pub fn new_layouts(&self) -> Vec<&Identifier> {
        self.current
            .layouts
            .difference(&self.previous.layouts)
            .collect()
    }

    /// Items present in the previous run that no longer exist.
    pub fn removed_items(&self) -> Vec<&Identifier> {
        self.previous
            .items
            .difference(&self.current.items)
            .collect()
    }

    /// Layouts present in the previous run that no longer exist.
    pub fn removed_layouts(&self) -> Vec<&Identifier> {
        self.previous
            .layouts
            .difference(&self.current.layouts)
            .collect()
    }

    /// The identifiers of the current site.
    pub fn current(&self) -> &KnownIdentifiers {
        &self.current
    }

    /// The recorded table, for persisting.
    pub fn table(&self) -> &DependencyTable {
        &self.table
    }

    fn state_of(&self, target: &DependencyTarget) -> TargetState {
        let present = match target {
            DependencyTarget::Item(id) => self.current.items.contains(id),
            DependencyTarget::Layout(id) => self.current.layouts.contains(id),
            DependencyTarget::Config | DependencyTarget::Items | DependencyTarget::Layouts => true,
        };
        if present {
            TargetState::Present
        } else {
            TargetState::Removed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::PropValue;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn known(items: &[&str]) -> KnownIdentifiers {
        KnownIdentifiers {
            items: items.iter().map(|s| id(s)).collect(),
            layouts: BTreeSet::new(),
        }
    }

    fn dog() -> Dependent {
        Dependent::Item(id("/dog.md"))
    }

    #[test]
    fn no_dependencies() {
        let store = DependencyStore::new(known(&["/dog.md"]));
        assert!(store.dependencies_of(&dog()).is_empty());
    }

    #[test]
    fn config_without_props_records_everything() {
        let mut store = DependencyStore::new(known(&["/dog.md"]));
        store.record_dependency(&dog(), DependencyTarget::Config, PropertySet::none());
        let deps = store.raw_dependencies_of(&dog());
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].to_string(), "[  config ] (racp) ");
    }

    #[test]
    fn config_with_attributes() {
        let mut store = DependencyStore::new(known(&["/dog.md"]));
        store.record_dependency(
            &dog(),
            DependencyTarget::Config,
            PropertySet::none().attributes(true),
        );
        assert_eq!(
            store.raw_dependencies_of(&dog())[0].to_string(),
            "[  config ] (_a__) "
        );
    }

    #[test]
    fn repeated_records_merge() {
        let mut store = DependencyStore::new(known(&["/dog.md", "/about.md"]));
        let about = DependencyTarget::Item(id("/about.md"));
        store.record_dependency(&dog(), about.clone(), PropertySet::none().raw_content(true));
        store.record_dependency(&dog(), about, PropertySet::none().attributes(true));
        let deps = store.raw_dependencies_of(&dog());
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].to_string(), "[    item ] (ra__) /about.md");
    }

    #[test]
    fn edges_keep_first_recorded_order() {
        let mut store = DependencyStore::new(known(&["/dog.md", "/a.md", "/b.md"]));
        store.record_dependency(&dog(), DependencyTarget::Item(id("/b.md")), PropertySet::all());
        store.record_dependency(&dog(), DependencyTarget::Item(id("/a.md")), PropertySet::all());
        store.record_dependency(&dog(), DependencyTarget::Item(id("/b.md")), PropertySet::all());
        let targets: Vec<_> = store
            .raw_dependencies_of(&dog())
            .iter()
            .map(|e| e.target.clone())
            .collect();
        assert_eq!(
            targets,
            vec![
                DependencyTarget::Item(id("/b.md")),
                DependencyTarget::Item(id("/a.md"))
            ]
        );
    }

    #[test]
    fn collection_lines() {
        let mut store = DependencyStore::new(known(&["/dog.md"]));
        store.record_dependency(
            &dog(),
            DependencyTarget::Items,
            PropertySet::none().raw_content(true),
        );
        assert_eq!(
            store.raw_dependencies_of(&dog())[0].to_string(),
            "[   items ] (r___) matching any"
        );

        let mut store = DependencyStore::new(known(&["/dog.md"]));
        store.record_dependency(
            &dog(),
            DependencyTarget::Layouts,
            PropertySet::none().raw_content(PropValue::matching(["/about.*"])),
        );
        store.record_dependency(
            &dog(),
            DependencyTarget::Layouts,
            PropertySet::none().raw_content(PropValue::matching(["/giraffe.*"])),
        );
        assert_eq!(
            store.raw_dependencies_of(&dog())[0].to_string(),
            "[ layouts ] (r___) matching any of /about.*, /giraffe.*"
        );
    }

    #[test]
    fn self_dependency_is_allowed() {
        let mut store = DependencyStore::new(known(&["/dog.md"]));
        store.record_dependency(&dog(), DependencyTarget::Item(id("/dog.md")), PropertySet::all());
        assert_eq!(store.dependencies_of(&dog()).len(), 1);
    }

    #[test]
    fn removed_targets_are_annotated() {
        let mut table_store = DependencyStore::new(known(&["/dog.md", "/gone.md"]));
        table_store.record_dependency(
            &dog(),
            DependencyTarget::Item(id("/gone.md")),
            PropertySet::none().raw_content(true),
        );
        let store = DependencyStore::load(
            table_store.table().clone(),
            known(&["/dog.md", "/gone.md"]),
            known(&["/dog.md", "/new.md"]),
        );
        let deps = store.dependencies_of(&dog());
        assert_eq!(deps[0].state, TargetState::Removed);
        assert_eq!(store.new_items(), vec![&id("/new.md")]);
        assert_eq!(store.removed_items(), vec![&id("/gone.md")]);
    }

    #[test]
    fn forget_dependencies() {
        let mut store = DependencyStore::new(known(&["/dog.md"]));
        store.record_dependency(&dog(), DependencyTarget::Config, PropertySet::all());
        store.forget_dependencies_for(&dog());
        assert!(store.raw_dependencies_of(&dog()).is_empty());
        assert!(store.table().is_empty());
    }

    #[test]
    fn table_serializes_as_keyed_object() {
        let mut store = DependencyStore::new(known(&["/dog.md"]));
        store.record_dependency(&dog(), DependencyTarget::Config, PropertySet::none().path(true));
        let json = serde_json::to_string(store.table()).unwrap();
        assert!(json.starts_with(r#"{"item:/dog.md":[{"target":{"kind":"config"}"#));
        let back: DependencyTable = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, store.table());
    }
}
