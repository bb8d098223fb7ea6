//! What the checker needs to know about each rep's current plan.

use std::collections::BTreeMap;
use std::path::PathBuf;

use kiln_common::{ContentHash, Identifier};
use kiln_model::{ItemRep, RepName};

/// The parts of a rep's plan that bear on outdatedness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    /// Checksum of the plan.
    pub checksum: ContentHash,
    /// Output paths the plan writes, relative to the output directory.
    pub paths: Vec<PathBuf>,
    /// Whether the plan uses a filter that is never up to date.
    pub always_outdated: bool,
}

/// Plan summaries of every rep in the current run.
#[derive(Debug, Clone, Default)]
pub struct PlanIndex {
    plans: BTreeMap<ItemRep, PlanSummary>,
}

impl PlanIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the summary of a rep.
    pub fn insert(&mut self, rep: ItemRep, summary: PlanSummary) {
        self.plans.insert(rep, summary);
    }

    /// The summary of a rep.
    pub fn get(&self, rep: &ItemRep) -> Option<&PlanSummary> {
        self.plans.get(rep)
    }

    /// The reps of one item, in rep name order.
    pub fn reps_of<'a>(
        &'a self,
        item: &'a Identifier,
    ) -> impl Iterator<Item = (&'a ItemRep, &'a PlanSummary)> + 'a {
        self.plans
            .range(ItemRep::new(item.clone(), RepName::new(""))..)
            .take_while(move |(rep, _)| &rep.item == item)
    }

    /// Iterates over every rep.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemRep, &PlanSummary)> {
        self.plans.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reps_of_item() {
        let summary = PlanSummary {
            checksum: ContentHash::from_bytes(b"x"),
            paths: vec![],
            always_outdated: false,
        };
        let a = Identifier::new("/a.md").unwrap();
        let ab = Identifier::new("/a.md.bak").unwrap();
        let mut index = PlanIndex::new();
        index.insert(ItemRep::default_of(a.clone()), summary.clone());
        index.insert(ItemRep::new(a.clone(), RepName::new("pdf")), summary.clone());
        index.insert(ItemRep::default_of(ab), summary);
        let names: Vec<&str> = index.reps_of(&a).map(|(r, _)| r.name.as_str()).collect();
        assert_eq!(names, vec!["default", "pdf"]);
    }
}
