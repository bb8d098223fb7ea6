//! The outdatedness decision procedure.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use kiln_cache::Cache;
use kiln_checksum::{ChecksumCache, ChecksumError, ObjectChecksums, ObjectKey};
use kiln_common::Identifier;
use kiln_deps::{
    Dependency, DependencyStore, DependencyTarget, Dependent, PropValue, PropertySet, TargetState,
};
use kiln_model::{ItemRep, Site};

use crate::plan::PlanIndex;
use crate::reason::Reason;

/// Something whose outdatedness can be asked about.
#[derive(Debug, Clone, Copy)]
pub enum Outdatable<'e> {
    /// An item rep.
    Rep(&'e ItemRep),
    /// A layout, by identifier.
    Layout(&'e Identifier),
}

impl<'e> From<&'e ItemRep> for Outdatable<'e> {
    fn from(rep: &'e ItemRep) -> Self {
        Outdatable::Rep(rep)
    }
}

/// Result of a dependency walk. `cut` is set when the walk hit an entity
/// that was already being evaluated further up, so a negative answer is
/// only valid for this walk.
#[derive(Debug, Clone, Copy, Default)]
struct Eval {
    outdated: bool,
    cut: bool,
}

impl Eval {
    const OUTDATED: Eval = Eval {
        outdated: true,
        cut: false,
    };
}

impl From<bool> for Eval {
    fn from(outdated: bool) -> Self {
        Eval {
            outdated,
            cut: false,
        }
    }
}

/// Decides, per rep or layout, whether recompilation is needed.
///
/// Compares the previous run's records in the [`Cache`] with the current
/// site, and walks the previous run's dependency graph. Must be consulted
/// before the compiler starts replacing dependency edges.
///
/// Results are memoized for the lifetime of the checker.
pub struct OutdatednessChecker<'a> {
    site: &'a Site,
    cache: &'a Cache,
    checksums: &'a ChecksumCache,
    deps: &'a DependencyStore,
    plans: &'a PlanIndex,
    basic: RefCell<HashMap<ItemRep, Vec<Reason>>>,
    deps_memo: RefCell<HashMap<Dependent, bool>>,
    in_progress: RefCell<HashSet<Dependent>>,
}

impl<'a> OutdatednessChecker<'a> {
    /// Creates a checker over the current site and the previous run's state.
    pub fn new(
        site: &'a Site,
        cache: &'a Cache,
        checksums: &'a ChecksumCache,
        deps: &'a DependencyStore,
        plans: &'a PlanIndex,
    ) -> Self {
        Self {
            site,
            cache,
            checksums,
            deps,
            plans,
            basic: RefCell::new(HashMap::new()),
            deps_memo: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
        }
    }

    /// Returns every reason the entity must be recompiled. Empty means the
    /// previous result can be reused.
    pub fn outdatedness_reasons_for(
        &self,
        entity: Outdatable<'_>,
    ) -> Result<Vec<Reason>, ChecksumError> {
        let (mut reasons, dependent) = match entity {
            Outdatable::Rep(rep) => (
                self.basic_rep_reasons(rep)?,
                Dependent::Item(rep.item.clone()),
            ),
            Outdatable::Layout(id) => (
                self.basic_layout_reasons(id)?,
                Dependent::Layout(id.clone()),
            ),
        };
        if reasons.first() == Some(&Reason::NotYetCompiled) {
            return Ok(reasons);
        }
        if self.dependencies_outdated(&dependent)?.outdated {
            reasons.push(Reason::DependenciesOutdated);
        }
        Ok(reasons)
    }

    /// Returns `true` if the entity must be recompiled.
    pub fn is_outdated(&self, entity: Outdatable<'_>) -> Result<bool, ChecksumError> {
        Ok(!self.outdatedness_reasons_for(entity)?.is_empty())
    }

    fn basic_rep_reasons(&self, rep: &ItemRep) -> Result<Vec<Reason>, ChecksumError> {
        if let Some(reasons) = self.basic.borrow().get(rep) {
            return Ok(reasons.clone());
        }
        let reasons = self.compute_basic_rep_reasons(rep)?;
        self.basic.borrow_mut().insert(rep.clone(), reasons.clone());
        Ok(reasons)
    }

    fn compute_basic_rep_reasons(&self, rep: &ItemRep) -> Result<Vec<Reason>, ChecksumError> {
        let key = ObjectKey::Item(rep.item.clone());
        let (Some(record), Some(previous)) =
            (self.cache.rule_record(rep), self.cache.checksums_of(&key))
        else {
            return Ok(vec![Reason::NotYetCompiled]);
        };
        if self.cache.is_pending(rep) {
            return Ok(vec![Reason::NotYetCompiled]);
        }

        let mut reasons = Vec::new();
        if self.object_changed(&ObjectKey::CodeSnippets)? {
            reasons.push(Reason::CodeSnippetsModified);
        }
        reasons.extend(self.document_reasons(&key, previous)?);
        match self.plans.get(rep) {
            Some(plan) => {
                if plan.checksum != record.checksum {
                    reasons.push(Reason::RulesModified);
                }
                if plan.always_outdated {
                    reasons.push(Reason::UsesAlwaysOutdatedFilter);
                }
                let output_dir = self.site.config.output_dir();
                if plan.paths.iter().any(|p| !output_dir.join(p).exists()) {
                    reasons.push(Reason::NotWritten);
                }
            }
            None => reasons.push(Reason::RulesModified),
        }
        Ok(reasons)
    }

    fn basic_layout_reasons(&self, id: &Identifier) -> Result<Vec<Reason>, ChecksumError> {
        let key = ObjectKey::Layout(id.clone());
        match self.cache.checksums_of(&key) {
            Some(previous) => self.document_reasons(&key, previous),
            None => Ok(vec![Reason::NotYetCompiled]),
        }
    }

    fn document_reasons(
        &self,
        key: &ObjectKey,
        previous: &ObjectChecksums,
    ) -> Result<Vec<Reason>, ChecksumError> {
        let Some(current) = self.checksums.checksums_for(self.site, key)? else {
            return Ok(vec![Reason::ContentModified]);
        };
        let mut reasons = Vec::new();
        if current.content != previous.content {
            reasons.push(Reason::ContentModified);
        }
        let changed = current.changed_attributes(previous);
        if !changed.is_empty() {
            reasons.push(Reason::AttributesModified(changed));
        }
        Ok(reasons)
    }

    /// Compares the whole checksum of an object across runs.
    fn object_changed(&self, key: &ObjectKey) -> Result<bool, ChecksumError> {
        let previous = self.cache.checksums_of(key);
        let current = self.checksums.checksums_for(self.site, key)?;
        Ok(match (previous, current) {
            (Some(p), Some(c)) => p.whole != c.whole,
            (None, None) => false,
            _ => true,
        })
    }

    fn content_changed(&self, key: &ObjectKey) -> Result<bool, ChecksumError> {
        let previous = self.cache.checksums_of(key);
        let current = self.checksums.checksums_for(self.site, key)?;
        Ok(match (previous, current) {
            (Some(p), Some(c)) => p.content != c.content,
            _ => true,
        })
    }

    fn attributes_changed(&self, key: &ObjectKey) -> Result<bool, ChecksumError> {
        let previous = self.cache.checksums_of(key);
        let current = self.checksums.checksums_for(self.site, key)?;
        Ok(match (previous, current) {
            (Some(p), Some(c)) => !c.changed_attributes(p).is_empty(),
            _ => true,
        })
    }

    /// Whether any rep of the item has a different plan, or reps were
    /// added or dropped.
    fn rules_changed(&self, id: &Identifier) -> bool {
        let mut current = 0;
        for (rep, plan) in self.plans.reps_of(id) {
            current += 1;
            match self.cache.rule_record(rep) {
                Some(record) if record.checksum == plan.checksum => {}
                _ => return true,
            }
        }
        let previous = self
            .cache
            .manifest()
            .rules
            .keys()
            .filter(|rep| &rep.item == id)
            .count();
        previous != current
    }

    /// Whether an item is outdated for the purpose of someone depending on
    /// its compiled content: any rep has basic reasons, or its own
    /// dependencies are outdated.
    fn item_outdated(&self, id: &Identifier) -> Result<Eval, ChecksumError> {
        for (rep, _) in self.plans.reps_of(id) {
            if !self.basic_rep_reasons(rep)?.is_empty() {
                return Ok(Eval::OUTDATED);
            }
        }
        self.dependencies_outdated(&Dependent::Item(id.clone()))
    }

    fn dependencies_outdated(&self, dependent: &Dependent) -> Result<Eval, ChecksumError> {
        if let Some(&outdated) = self.deps_memo.borrow().get(dependent) {
            return Ok(outdated.into());
        }
        if !self.in_progress.borrow_mut().insert(dependent.clone()) {
            return Ok(Eval {
                outdated: false,
                cut: true,
            });
        }
        let result = self.walk_dependencies(dependent);
        self.in_progress.borrow_mut().remove(dependent);
        let eval = result?;

        if eval.outdated || !eval.cut {
            self.deps_memo
                .borrow_mut()
                .insert(dependent.clone(), eval.outdated);
        }
        if eval.outdated {
            tracing::trace!(dependent = %dependent, "dependencies outdated");
        }
        Ok(eval)
    }

    fn walk_dependencies(&self, dependent: &Dependent) -> Result<Eval, ChecksumError> {
        let mut cut = false;
        for dependency in self.deps.dependencies_of(dependent) {
            let eval = self.dependency_causes_outdatedness(&dependency)?;
            cut |= eval.cut;
            if eval.outdated {
                return Ok(Eval {
                    outdated: true,
                    cut,
                });
            }
        }
        Ok(Eval {
            outdated: false,
            cut,
        })
    }

    fn dependency_causes_outdatedness(
        &self,
        dependency: &Dependency<'_>,
    ) -> Result<Eval, ChecksumError> {
        if dependency.state == TargetState::Removed {
            return Ok(Eval::OUTDATED);
        }
        let props = &dependency.edge.props;
        match &dependency.edge.target {
            DependencyTarget::Item(id) => {
                self.document_dependency(&ObjectKey::Item(id.clone()), props, Some(id))
            }
            DependencyTarget::Layout(id) => {
                self.document_dependency(&ObjectKey::Layout(id.clone()), props, None)
            }
            DependencyTarget::Config => self.config_dependency(props).map(Eval::from),
            DependencyTarget::Items => self.items_dependency(props),
            DependencyTarget::Layouts => self.layouts_dependency(props).map(Eval::from),
        }
    }

    fn document_dependency(
        &self,
        key: &ObjectKey,
        props: &PropertySet,
        item: Option<&Identifier>,
    ) -> Result<Eval, ChecksumError> {
        let previous = self.cache.checksums_of(key);
        let current = self.checksums.checksums_for(self.site, key)?;
        let (Some(previous), Some(current)) = (previous, current) else {
            return Ok(Eval::OUTDATED);
        };

        if props.raw_content.is_active() && previous.content != current.content {
            return Ok(Eval::OUTDATED);
        }
        if props.attributes.is_active()
            && current
                .changed_attributes(previous)
                .iter()
                .any(|k| props.attributes.covers_key(k))
        {
            return Ok(Eval::OUTDATED);
        }
        let Some(id) = item else {
            return Ok(Eval::default());
        };
        if props.path.is_active() && self.rules_changed(id) {
            return Ok(Eval::OUTDATED);
        }
        if props.compiled_content.is_active() {
            return self.item_outdated(id);
        }
        Ok(Eval::default())
    }

    fn config_dependency(&self, props: &PropertySet) -> Result<bool, ChecksumError> {
        let previous = self.cache.checksums_of(&ObjectKey::Config);
        let current = self.checksums.checksums_for(self.site, &ObjectKey::Config)?;
        let (Some(previous), Some(current)) = (previous, current) else {
            return Ok(true);
        };

        let whole = props.raw_content.is_active()
            || props.compiled_content.is_active()
            || props.path.is_active()
            || props.attributes == PropValue::Any;
        if whole && previous.whole != current.whole {
            return Ok(true);
        }
        if let PropValue::Matching(keys) = &props.attributes {
            return Ok(current
                .changed_attributes(previous)
                .iter()
                .any(|k| keys.contains(k)));
        }
        Ok(false)
    }

    fn member_matches(&self, value: &PropValue, id: &Identifier) -> bool {
        match value {
            PropValue::Off => false,
            PropValue::Any => true,
            PropValue::Matching(patterns) => patterns.iter().any(|source| {
                self.site
                    .items
                    .pattern(source)
                    .map(|p| p.matches(id))
                    .unwrap_or(true)
            }),
        }
    }

    fn items_dependency(&self, props: &PropertySet) -> Result<Eval, ChecksumError> {
        let mut churned = self.deps.new_items();
        churned.extend(self.deps.removed_items());
        for value in [
            &props.raw_content,
            &props.attributes,
            &props.compiled_content,
            &props.path,
        ] {
            if churned.iter().any(|id| self.member_matches(value, id)) {
                return Ok(Eval::OUTDATED);
            }
        }

        let mut cut = false;
        for id in self.site.items.identifiers() {
            let key = ObjectKey::Item(id.clone());
            if self.member_matches(&props.raw_content, id) && self.content_changed(&key)? {
                return Ok(Eval::OUTDATED);
            }
            if self.member_matches(&props.attributes, id) && self.attributes_changed(&key)? {
                return Ok(Eval::OUTDATED);
            }
            if self.member_matches(&props.path, id) && self.rules_changed(id) {
                return Ok(Eval::OUTDATED);
            }
            if self.member_matches(&props.compiled_content, id) {
                let eval = self.item_outdated(id)?;
                cut |= eval.cut;
                if eval.outdated {
                    return Ok(Eval {
                        outdated: true,
                        cut,
                    });
                }
            }
        }
        Ok(Eval {
            outdated: false,
            cut,
        })
    }

    fn layouts_dependency(&self, props: &PropertySet) -> Result<bool, ChecksumError> {
        let mut churned = self.deps.new_layouts();
        churned.extend(self.deps.removed_layouts());
        for value in [
            &props.raw_content,
            &props.attributes,
            &props.compiled_content,
            &props.path,
        ] {
            if churned.iter().any(|id| self.member_matches(value, id)) {
                return Ok(true);
            }
        }

        for id in self.site.layouts.identifiers() {
            let key = ObjectKey::Layout(id.clone());
            if self.member_matches(&props.raw_content, id) && self.content_changed(&key)? {
                return Ok(true);
            }
            if self.member_matches(&props.attributes, id) && self.attributes_changed(&key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
