//! The compiler: plans every rep, decides what to reuse, schedules the rest
//! and persists the results.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use kiln_cache::{Cache, RuleRecord};
use kiln_checksum::{digest, ChecksumCache};
use kiln_common::Identifier;
use kiln_deps::{DependencyStore, DependencyTarget, Dependent, KnownIdentifiers, PropertySet};
use kiln_model::{Content, Document, ItemRep, Site};
use kiln_outdated::{Outdatable, OutdatednessChecker, PlanIndex, PlanSummary, Reason};

use crate::action::{Action, ActionRecorder, ActionSequence};
use crate::error::{CompilationError, CompileError};
use crate::filter::{FilterContext, FilterRegistry, StepOutcome};
use crate::listener::{CompilationListener, RepEnded, RepOutcome};
use crate::output::write_snapshot;
use crate::rules::RuleSet;

type Snapshots = BTreeMap<String, Content>;

/// Progress of one rep through its plan. Kept across suspensions so the
/// rep resumes at the step that suspended it.
#[derive(Debug)]
struct Pipeline {
    next: usize,
    content: Content,
    snapshots: Snapshots,
    elapsed: Duration,
}

impl Pipeline {
    fn new(content: Content) -> Self {
        Self {
            next: 0,
            content,
            snapshots: Snapshots::new(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Compiles a site.
///
/// Owns the persistent store, the dependency graph and the checksum cache
/// for the duration of one run.
pub struct Compiler<'s> {
    site: &'s Site,
    rules: RuleSet,
    filters: FilterRegistry,
    cache: Cache,
    checksums: ChecksumCache,
    deps: DependencyStore,
    reps: Vec<ItemRep>,
    plans: BTreeMap<ItemRep, ActionSequence>,
    plan_index: PlanIndex,
    compiled: BTreeMap<ItemRep, Snapshots>,
    reps_built: bool,
}

impl<'s> Compiler<'s> {
    /// Creates a compiler, restoring the dependency graph of the previous run
    /// from `cache`.
    pub fn new(site: &'s Site, rules: RuleSet, filters: FilterRegistry, cache: Cache) -> Self {
        let manifest = cache.manifest();
        let deps = DependencyStore::load(
            manifest.dependencies.clone(),
            manifest.known.clone(),
            KnownIdentifiers::of_site(site),
        );
        Self {
            site,
            rules,
            filters,
            cache,
            checksums: ChecksumCache::new(),
            deps,
            reps: Vec::new(),
            plans: BTreeMap::new(),
            plan_index: PlanIndex::new(),
            compiled: BTreeMap::new(),
            reps_built: false,
        }
    }

    /// Creates every rep and resolves its plan, without compiling anything.
    pub fn run_until_reps_built(&mut self) -> Result<(), CompileError> {
        if self.reps_built {
            return Ok(());
        }
        let recorder = ActionRecorder::new(self.site, &self.rules, &self.filters);
        let mut reps = Vec::new();
        let mut plans = BTreeMap::new();
        let mut index = PlanIndex::new();

        for item in &self.site.items {
            let rules = self.rules.rules_for(item.identifier());
            if rules.is_empty() {
                return Err(CompileError::NoMatchingRule {
                    item: item.identifier().clone(),
                });
            }
            for rule in rules {
                let rep = ItemRep::new(item.identifier().clone(), rule.rep.clone());
                let plan = recorder.plan(&rep)?;
                index.insert(
                    rep.clone(),
                    PlanSummary {
                        checksum: digest(&plan)?,
                        paths: plan.paths(),
                        always_outdated: plan
                            .filter_names()
                            .any(|name| self.filters.is_always_outdated(name)),
                    },
                );
                plans.insert(rep.clone(), plan);
                reps.push(rep);
            }
        }

        tracing::debug!(reps = reps.len(), "built item reps");
        self.reps = reps;
        self.plans = plans;
        self.plan_index = index;
        self.reps_built = true;
        Ok(())
    }

    /// Compiles every rep, then persists the results.
    ///
    /// On failure nothing is persisted unless the site sets
    /// `persist_progress_on_failure`, in which case completed reps are
    /// flushed and the rest are marked pending.
    pub fn run_all(&mut self, listener: &mut dyn CompilationListener) -> Result<(), CompileError> {
        let started = Instant::now();
        self.run_until_reps_built()?;
        listener.run_started(&self.reps);

        let result = self
            .outdatedness()
            .and_then(|reasons| self.compile_reps(&reasons, listener));
        if let Err(e) = result {
            if self.site.config.persist_progress_on_failure() {
                tracing::info!(
                    completed = self.compiled.len(),
                    "persisting progress of failed run"
                );
                if let Err(store_err) = self.store() {
                    tracing::warn!("could not persist progress: {store_err}");
                }
            }
            return Err(e);
        }
        self.store()?;

        let elapsed = started.elapsed();
        tracing::info!(
            reps = self.reps.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "site compiled"
        );
        listener.run_ended(elapsed);
        Ok(())
    }

    /// Every rep, in declaration order. Empty until reps are built.
    pub fn reps(&self) -> &[ItemRep] {
        &self.reps
    }

    /// The plan of a rep.
    pub fn plan(&self, rep: &ItemRep) -> Option<&ActionSequence> {
        self.plans.get(rep)
    }

    /// Plan summaries of every rep.
    pub fn plan_index(&self) -> &PlanIndex {
        &self.plan_index
    }

    /// The dependency graph: the previous run's until reps are compiled.
    pub fn dependency_store(&self) -> &DependencyStore {
        &self.deps
    }

    /// A checker comparing the current site with the previous run.
    ///
    /// Only meaningful before [`Compiler::run_all`] replaces the graph.
    pub fn checker(&self) -> OutdatednessChecker<'_> {
        OutdatednessChecker::new(
            self.site,
            &self.cache,
            &self.checksums,
            &self.deps,
            &self.plan_index,
        )
    }

    /// The snapshots of a compiled rep.
    pub fn compiled_snapshots(&self, rep: &ItemRep) -> Option<&BTreeMap<String, Content>> {
        self.compiled.get(rep)
    }

    /// The persistent store.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Gives the persistent store back.
    pub fn into_cache(self) -> Cache {
        self.cache
    }

    fn outdatedness(&self) -> Result<HashMap<ItemRep, Vec<Reason>>, CompileError> {
        let checker = self.checker();
        let mut reasons = HashMap::new();
        for rep in &self.reps {
            reasons.insert(
                rep.clone(),
                checker.outdatedness_reasons_for(Outdatable::Rep(rep))?,
            );
        }
        Ok(reasons)
    }

    fn compile_reps(
        &mut self,
        reasons: &HashMap<ItemRep, Vec<Reason>>,
        listener: &mut dyn CompilationListener,
    ) -> Result<(), CompileError> {
        let no_reasons: &[Reason] = &[];
        let reasons_of = |rep: &ItemRep| reasons.get(rep).map_or(no_reasons, Vec::as_slice);

        // Sibling reps are compiled together: one stale rep makes the whole
        // item stale.
        let mut stale: HashSet<&Identifier> = self
            .reps
            .iter()
            .filter(|rep| !reasons_of(*rep).is_empty())
            .map(|rep| &rep.item)
            .collect();
        let mut reusable = HashMap::new();
        for rep in &self.reps {
            if stale.contains(&rep.item) {
                continue;
            }
            match self.cache.load_compiled(rep) {
                Some(snapshots) => {
                    reusable.insert(rep.clone(), snapshots);
                }
                None => {
                    stale.insert(&rep.item);
                }
            }
        }
        let stale: HashSet<Identifier> = stale.into_iter().cloned().collect();

        let mut queue = VecDeque::new();
        for rep in self.reps.clone() {
            if stale.contains(&rep.item) {
                queue.push_back(rep);
            } else if let Some(snapshots) = reusable.remove(&rep) {
                tracing::debug!(rep = %rep, "reusing compiled content");
                listener.rep_started(&rep);
                self.finish_rep(
                    &rep,
                    snapshots,
                    RepOutcome::Reused,
                    Duration::ZERO,
                    &[],
                    listener,
                )?;
            }
        }

        let mut pipelines: HashMap<ItemRep, Pipeline> = HashMap::new();
        let mut waiting_on: HashMap<ItemRep, ItemRep> = HashMap::new();
        let mut parked: HashMap<ItemRep, Vec<ItemRep>> = HashMap::new();
        let mut forgotten: HashSet<Identifier> = HashSet::new();

        while let Some(rep) = queue.pop_front() {
            let dependent = Dependent::Item(rep.item.clone());
            if forgotten.insert(rep.item.clone()) {
                self.deps.forget_dependencies_for(&dependent);
            }
            let mut state = match pipelines.remove(&rep) {
                Some(state) => state,
                None => {
                    tracing::debug!(rep = %rep, reasons = ?reasons_of(&rep), "compiling");
                    let item = self.site.items.get(&rep.item).ok_or_else(|| {
                        CompileError::UnknownRep { rep: rep.clone() }
                    })?;
                    Pipeline::new(item.content().clone())
                }
            };

            listener.rep_started(&rep);
            let step_started = Instant::now();
            let outcome = self.advance(&rep, &mut state);
            state.elapsed += step_started.elapsed();

            let Some(needed) = outcome? else {
                let Pipeline {
                    snapshots, elapsed, ..
                } = state;
                self.finish_rep(
                    &rep,
                    snapshots,
                    RepOutcome::Compiled,
                    elapsed,
                    reasons_of(&rep),
                    listener,
                )?;
                for waiter in parked.remove(&rep).unwrap_or_default() {
                    waiting_on.remove(&waiter);
                    queue.push_back(waiter);
                }
                continue;
            };

            if !self.plans.contains_key(&needed) {
                return Err(CompileError::UnknownRep { rep: needed });
            }
            if self.compiled.contains_key(&needed) {
                pipelines.insert(rep.clone(), state);
                queue.push_back(rep);
                continue;
            }
            if let Some(chain) = cycle_through(&waiting_on, &rep, &needed) {
                return Err(CompileError::DependencyCycle { chain });
            }

            tracing::debug!(rep = %rep, needs = %needed, "suspended");
            listener.rep_suspended(&rep, &needed);
            waiting_on.insert(rep.clone(), needed.clone());
            parked.entry(needed).or_default().push(rep.clone());
            pipelines.insert(rep, state);
        }

        // Every wait is on a queued or parked rep, and cycles are refused
        // above, so the queue only drains once everything is compiled.
        if let Some((rep, needed)) = waiting_on.into_iter().next() {
            return Err(CompileError::DependencyCycle {
                chain: vec![rep, needed],
            });
        }
        Ok(())
    }

    /// Runs the plan of `rep` from where it stopped. Returns the rep it
    /// needs if a step suspended.
    fn advance(
        &mut self,
        rep: &ItemRep,
        state: &mut Pipeline,
    ) -> Result<Option<ItemRep>, CompileError> {
        let site = self.site;
        let unknown = || CompileError::UnknownRep { rep: rep.clone() };
        let plan = self.plans.get(rep).ok_or_else(unknown)?;
        let item = site.items.get(&rep.item).ok_or_else(unknown)?;

        while let Some(action) = plan.actions().get(state.next) {
            let outcome = match action {
                Action::Snapshot { name, .. } => {
                    state
                        .snapshots
                        .insert(name.clone(), state.content.clone());
                    None
                }
                Action::Filter { name, params } => {
                    let filter = self.filters.get(name).ok_or_else(|| {
                        CompileError::UnknownFilter {
                            rep: rep.clone(),
                            filter: name.clone(),
                        }
                    })?;
                    let mut ctx = FilterContext::new(
                        site,
                        rep,
                        item,
                        &mut self.deps,
                        &self.plans,
                        &self.compiled,
                    );
                    Some(filter.run(&state.content, params, &mut ctx))
                }
                Action::Layout {
                    identifier,
                    filter,
                    params,
                } => {
                    let layout = site.layouts.get(identifier).ok_or_else(|| {
                        CompileError::NoSuchLayout {
                            rep: rep.clone(),
                            layout: identifier.clone(),
                        }
                    })?;
                    let filter = self.filters.get(filter).ok_or_else(|| {
                        CompileError::UnknownFilter {
                            rep: rep.clone(),
                            filter: filter.clone(),
                        }
                    })?;
                    self.deps.record_dependency(
                        &Dependent::Item(rep.item.clone()),
                        DependencyTarget::Layout(identifier.clone()),
                        PropertySet::none().raw_content(true).attributes(true),
                    );
                    let mut ctx = FilterContext::new(
                        site,
                        rep,
                        item,
                        &mut self.deps,
                        &self.plans,
                        &self.compiled,
                    )
                    .laying_out(layout, &state.content);
                    Some(filter.run(layout.content(), params, &mut ctx))
                }
            };

            match outcome {
                None => {}
                Some(Ok(StepOutcome::Ready(content))) => state.content = content,
                Some(Ok(StepOutcome::NeedsRep(needed))) => return Ok(Some(needed)),
                Some(Err(source)) => {
                    return Err(CompilationError::new(rep.clone(), action.describe(), source).into())
                }
            }
            state.next += 1;
        }
        Ok(None)
    }

    fn finish_rep(
        &mut self,
        rep: &ItemRep,
        snapshots: Snapshots,
        outcome: RepOutcome,
        duration: Duration,
        reasons: &[Reason],
        listener: &mut dyn CompilationListener,
    ) -> Result<(), CompileError> {
        let plan = self
            .plans
            .get(rep)
            .ok_or_else(|| CompileError::UnknownRep { rep: rep.clone() })?;
        let output_dir = self.site.config.output_dir();
        for (name, path) in plan.snapshots_with_paths() {
            if let Some(content) = snapshots.get(name) {
                listener.file_writing(rep, path, content);
                let action = write_snapshot(&output_dir, path, content)?;
                listener.file_written(rep, path, action);
            }
        }
        listener.rep_ended(&RepEnded {
            rep,
            duration,
            reasons,
            outcome,
        });
        self.compiled.insert(rep.clone(), snapshots);
        Ok(())
    }

    /// Writes checksums, rules, the dependency graph, known identifiers and
    /// compiled snapshots to the persistent store. Reps without compiled
    /// content are marked pending.
    fn store(&mut self) -> Result<(), CompileError> {
        let checksums = self.checksums.all(self.site)?;
        for (rep, snapshots) in &self.compiled {
            self.cache.store_compiled(rep, snapshots)?;
        }

        let manifest = self.cache.manifest_mut();
        manifest.checksums = checksums;
        manifest.rules = self
            .compiled
            .keys()
            .filter_map(|rep| {
                let summary = self.plan_index.get(rep)?;
                Some((
                    rep.clone(),
                    RuleRecord {
                        checksum: summary.checksum,
                        paths: summary.paths.clone(),
                    },
                ))
            })
            .collect();
        manifest.pending = self
            .reps
            .iter()
            .filter(|rep| !self.compiled.contains_key(*rep))
            .cloned()
            .collect();
        manifest.compiled.retain(|rep, _| self.plans.contains_key(rep));
        manifest.dependencies = self.deps.table().clone();
        manifest.known = self.deps.current().clone();

        self.cache.save()?;
        self.cache.gc()?;
        Ok(())
    }
}

/// If `rep` waiting on `needed` closes a loop, returns the loop starting
/// and ending at `rep`.
fn cycle_through(
    waiting_on: &HashMap<ItemRep, ItemRep>,
    rep: &ItemRep,
    needed: &ItemRep,
) -> Option<Vec<ItemRep>> {
    let mut chain = vec![rep.clone(), needed.clone()];
    let mut current = needed;
    while current != rep {
        current = waiting_on.get(current)?;
        chain.push(current.clone());
    }
    Some(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep(id: &str) -> ItemRep {
        ItemRep::default_of(Identifier::new(id).unwrap())
    }

    #[test]
    fn self_wait_is_a_cycle() {
        let waiting = HashMap::new();
        let a = rep("/a.md");
        assert_eq!(cycle_through(&waiting, &a, &a), Some(vec![a.clone(), a]));
    }

    #[test]
    fn chain_back_to_rep_is_a_cycle() {
        let (a, b, c) = (rep("/a.md"), rep("/b.md"), rep("/c.md"));
        let mut waiting = HashMap::new();
        waiting.insert(b.clone(), c.clone());
        waiting.insert(c.clone(), a.clone());
        assert_eq!(
            cycle_through(&waiting, &a, &b),
            Some(vec![a.clone(), b.clone(), c.clone(), a.clone()])
        );
    }

    #[test]
    fn open_chain_is_not_a_cycle() {
        let (a, b, c) = (rep("/a.md"), rep("/b.md"), rep("/c.md"));
        let mut waiting = HashMap::new();
        waiting.insert(b.clone(), c);
        assert_eq!(cycle_through(&waiting, &a, &b), None);
    }
}
