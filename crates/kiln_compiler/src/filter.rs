//! Filters and the context they run in.
//!
//! A filter transforms content. Anything it reads besides its input goes
//! through the [`FilterContext`], which records the matching dependency
//! edge. A filter that needs the compiled content of a rep that is not
//! built yet returns [`StepOutcome::NeedsRep`] and is run again once that
//! rep is done.

use std::collections::BTreeMap;

use kiln_common::{Identifier, PatternError};
use kiln_deps::{DependencyStore, DependencyTarget, Dependent, PropValue, PropertySet};
use kiln_model::{Configuration, Content, Document, Item, ItemRep, Layout, Site, Value};

use crate::action::{ActionSequence, LAST};
use crate::rules::Params;

/// Error type returned by filters.
pub type FilterError = Box<dyn std::error::Error + Send + Sync>;

/// Result of running one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The step produced new content.
    Ready(Content),
    /// The step needs the compiled content of another rep first.
    NeedsRep(ItemRep),
}

/// A content transformation.
pub trait Filter {
    /// Runs the filter over `content`.
    fn run(
        &self,
        content: &Content,
        params: &Params,
        ctx: &mut FilterContext<'_>,
    ) -> Result<StepOutcome, FilterError>;

    /// Whether the output can change without any input changing, so that
    /// the rep must be recompiled on every run.
    fn always_outdated(&self) -> bool {
        false
    }
}

/// Registered filters, by name.
#[derive(Default)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Box<dyn Filter>>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::filters::register_builtins(&mut registry);
        registry
    }

    /// Registers a filter, replacing any filter of the same name.
    pub fn register(&mut self, name: impl Into<String>, filter: impl Filter + 'static) {
        self.filters.insert(name.into(), Box::new(filter));
    }

    /// Looks up a filter.
    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(Box::as_ref)
    }

    /// Returns `true` if a filter of that name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Returns `true` if the named filter is registered and always outdated.
    pub fn is_always_outdated(&self, name: &str) -> bool {
        self.get(name).is_some_and(|f| f.always_outdated())
    }

    /// Names of the registered filters, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.filters.keys()).finish()
    }
}

/// Errors raised by context lookups.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The referenced item does not exist.
    #[error("no item with identifier {0}")]
    NoSuchItem(Identifier),

    /// The referenced rep is not produced by any rule.
    #[error("no {0}")]
    NoSuchRep(ItemRep),

    /// A pattern passed to a lookup is malformed.
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

/// What a filter can see while it runs.
pub struct FilterContext<'a> {
    site: &'a Site,
    rep: &'a ItemRep,
    item: &'a Item,
    layout: Option<&'a Layout>,
    content_to_yield: Option<&'a Content>,
    deps: &'a mut DependencyStore,
    plans: &'a BTreeMap<ItemRep, ActionSequence>,
    compiled: &'a BTreeMap<ItemRep, BTreeMap<String, Content>>,
}

impl<'a> FilterContext<'a> {
    /// Creates a context for a filter step of `rep`.
    pub fn new(
        site: &'a Site,
        rep: &'a ItemRep,
        item: &'a Item,
        deps: &'a mut DependencyStore,
        plans: &'a BTreeMap<ItemRep, ActionSequence>,
        compiled: &'a BTreeMap<ItemRep, BTreeMap<String, Content>>,
    ) -> Self {
        Self {
            site,
            rep,
            item,
            layout: None,
            content_to_yield: None,
            deps,
            plans,
            compiled,
        }
    }

    /// Turns this into the context of a layout step.
    pub fn laying_out(mut self, layout: &'a Layout, content: &'a Content) -> Self {
        self.layout = Some(layout);
        self.content_to_yield = Some(content);
        self
    }

    /// The rep being compiled.
    pub fn rep(&self) -> &ItemRep {
        self.rep
    }

    /// The item being compiled. Reading it records nothing.
    pub fn item(&self) -> &Item {
        self.item
    }

    /// The layout being applied, in a layout step.
    pub fn layout(&self) -> Option<&Layout> {
        self.layout
    }

    /// The content being laid out, in a layout step.
    pub fn content_to_yield(&self) -> Option<&Content> {
        self.content_to_yield
    }

    /// The site configuration. Reading it through this handle records a
    /// dependency on the whole configuration.
    pub fn config(&mut self) -> &'a Configuration {
        self.record(DependencyTarget::Config, PropertySet::all());
        &self.site.config
    }

    /// A single configuration value; records an attribute dependency on
    /// that key only.
    pub fn config_value(&mut self, key: &str) -> Option<&'a Value> {
        self.record(
            DependencyTarget::Config,
            PropertySet::none().attributes(PropValue::matching([key])),
        );
        self.site.config.get(key)
    }

    /// The raw content of another item.
    pub fn raw_content_of(&mut self, id: &Identifier) -> Result<&'a Content, ContextError> {
        let item = self.find_item(id)?;
        self.record(
            DependencyTarget::Item(id.clone()),
            PropertySet::none().raw_content(true),
        );
        Ok(item.content())
    }

    /// One attribute of another item.
    pub fn attribute_of(
        &mut self,
        id: &Identifier,
        key: &str,
    ) -> Result<Option<&'a Value>, ContextError> {
        let item = self.find_item(id)?;
        self.record(
            DependencyTarget::Item(id.clone()),
            PropertySet::none().attributes(PropValue::matching([key])),
        );
        Ok(item.attribute(key))
    }

    /// The output path of a rep, with a leading slash, or `None` if the rep
    /// is not written. A trailing index filename is dropped, so
    /// `/blog/index.html` reads as `/blog/`.
    pub fn path_of(&mut self, rep: &ItemRep) -> Result<Option<String>, ContextError> {
        let plan = self
            .plans
            .get(rep)
            .ok_or_else(|| ContextError::NoSuchRep(rep.clone()))?;
        self.record(
            DependencyTarget::Item(rep.item.clone()),
            PropertySet::none().path(true),
        );
        let index_filenames = self.site.config.index_filenames();
        Ok(plan.output_path().map(|p| {
            strip_index_filename(format!("/{}", p.to_string_lossy()), &index_filenames)
        }))
    }

    /// The final compiled content of a rep, or `None` if it is not compiled
    /// yet. A filter seeing `None` should return [`StepOutcome::NeedsRep`].
    pub fn compiled_content_of(&mut self, rep: &ItemRep) -> Result<Option<Content>, ContextError> {
        if !self.plans.contains_key(rep) {
            return Err(ContextError::NoSuchRep(rep.clone()));
        }
        self.record(
            DependencyTarget::Item(rep.item.clone()),
            PropertySet::none().compiled_content(true),
        );
        Ok(self
            .compiled
            .get(rep)
            .and_then(|snapshots| snapshots.get(LAST))
            .cloned())
    }

    /// Identifiers of the items matching a pattern, in collection order.
    /// Records a dependency on the set of matching items.
    pub fn find_items(&mut self, pattern: &str) -> Result<Vec<Identifier>, ContextError> {
        let compiled = self.site.items.pattern(pattern)?;
        self.record(
            DependencyTarget::Items,
            PropertySet::none().raw_content(PropValue::matching([pattern])),
        );
        Ok(self
            .site
            .items
            .matching(&compiled)
            .map(|item| item.identifier().clone())
            .collect())
    }

    fn find_item(&self, id: &Identifier) -> Result<&'a Item, ContextError> {
        self.site
            .items
            .get(id)
            .ok_or_else(|| ContextError::NoSuchItem(id.clone()))
    }

    fn record(&mut self, target: DependencyTarget, props: PropertySet) {
        if matches!(&target, DependencyTarget::Item(id) if id == &self.rep.item) {
            return;
        }
        let from = Dependent::Item(self.rep.item.clone());
        self.deps.record_dependency(&from, target, props);
    }
}

fn strip_index_filename(path: String, index_filenames: &[String]) -> String {
    for name in index_filenames {
        if let Some(dir) = path.strip_suffix(name.as_str()) {
            if dir.ends_with('/') {
                return dir.to_string();
            }
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_deps::KnownIdentifiers;
    use kiln_model::Attributes;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn site() -> Site {
        let config = Configuration::new("/site", BTreeMap::new()).with_defaults();
        let mut attrs = Attributes::new();
        attrs.insert("title".into(), Value::from("B"));
        Site::new(
            config,
            vec![
                Item::new("a", Attributes::new(), id("/a.md")),
                Item::new("b", attrs, id("/b.md")),
                Item::new("c", Attributes::new(), id("/notes/c.txt")),
            ],
            vec![],
            vec![],
        )
        .unwrap()
    }

    fn codes(deps: &DependencyStore) -> Vec<String> {
        deps.raw_dependencies_of(&Dependent::Item(id("/a.md")))
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn lookups_record_edges() {
        let site = site();
        let mut deps = DependencyStore::new(KnownIdentifiers::of_site(&site));
        let plans = BTreeMap::new();
        let compiled = BTreeMap::new();
        let rep = ItemRep::default_of(id("/a.md"));
        let item = site.items.get(&rep.item).unwrap();
        let mut ctx = FilterContext::new(&site, &rep, item, &mut deps, &plans, &compiled);

        assert_eq!(ctx.raw_content_of(&id("/b.md")).unwrap(), &Content::from("b"));
        assert_eq!(
            ctx.attribute_of(&id("/b.md"), "title").unwrap(),
            Some(&Value::from("B"))
        );
        assert_eq!(ctx.config_value("title"), None);
        assert_eq!(ctx.find_items("/*.md").unwrap(), vec![id("/a.md"), id("/b.md")]);
        assert!(matches!(
            ctx.raw_content_of(&id("/zzz.md")),
            Err(ContextError::NoSuchItem(_))
        ));

        assert_eq!(
            codes(&deps),
            vec![
                "[    item ] (ra__) /b.md",
                "[  config ] (_a__) ",
                "[   items ] (r___) matching any of /*.md",
            ]
        );
    }

    #[test]
    fn reading_own_item_records_nothing() {
        let site = site();
        let mut deps = DependencyStore::new(KnownIdentifiers::of_site(&site));
        let plans = BTreeMap::new();
        let compiled = BTreeMap::new();
        let rep = ItemRep::default_of(id("/a.md"));
        let item = site.items.get(&rep.item).unwrap();
        let mut ctx = FilterContext::new(&site, &rep, item, &mut deps, &plans, &compiled);
        ctx.raw_content_of(&id("/a.md")).unwrap();
        assert!(codes(&deps).is_empty());
    }

    #[test]
    fn compiled_content_requires_known_rep() {
        let site = site();
        let mut deps = DependencyStore::new(KnownIdentifiers::of_site(&site));
        let plans = BTreeMap::new();
        let compiled = BTreeMap::new();
        let rep = ItemRep::default_of(id("/a.md"));
        let item = site.items.get(&rep.item).unwrap();
        let mut ctx = FilterContext::new(&site, &rep, item, &mut deps, &plans, &compiled);
        let err = ctx
            .compiled_content_of(&ItemRep::default_of(id("/b.md")))
            .unwrap_err();
        assert!(matches!(err, ContextError::NoSuchRep(_)));
    }

    #[test]
    fn index_filenames_are_dropped_from_paths() {
        let index = vec!["index.html".to_string()];
        assert_eq!(strip_index_filename("/blog/index.html".into(), &index), "/blog/");
        assert_eq!(strip_index_filename("/index.html".into(), &index), "/");
        assert_eq!(strip_index_filename("/blog.html".into(), &index), "/blog.html");
        assert_eq!(strip_index_filename("/myindex.html".into(), &index), "/myindex.html");
        assert_eq!(strip_index_filename("/blog/index.html".into(), &[]), "/blog/index.html");
    }

    #[test]
    fn registry_lookup() {
        let registry = FilterRegistry::with_builtins();
        assert!(registry.contains("template"));
        assert!(registry.contains("trim"));
        assert!(registry.is_always_outdated("timestamp"));
        assert!(!registry.is_always_outdated("trim"));
        assert!(!registry.is_always_outdated("missing"));
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["template", "timestamp", "trim"]
        );
    }
}
