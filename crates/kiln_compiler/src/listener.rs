//! Observers of a compilation run.

use std::path::Path;
use std::time::Duration;

use kiln_model::{Content, ItemRep};
use kiln_outdated::Reason;

/// What happened to an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// The file did not exist.
    Created,
    /// The file existed with different content.
    Updated,
    /// The file already had this content and was left alone.
    Identical,
}

impl FileAction {
    /// Lower-case label, as printed by the CLI.
    pub fn label(self) -> &'static str {
        match self {
            FileAction::Created => "create",
            FileAction::Updated => "update",
            FileAction::Identical => "identical",
        }
    }
}

/// How a rep got its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepOutcome {
    /// Taken from the previous run.
    Reused,
    /// Compiled in this run.
    Compiled,
}

/// Summary of one finished rep.
#[derive(Debug, Clone)]
pub struct RepEnded<'a> {
    /// The rep.
    pub rep: &'a ItemRep,
    /// Time spent running its steps.
    pub duration: Duration,
    /// Why it was compiled; empty when reused.
    pub reasons: &'a [Reason],
    /// Whether it was reused or compiled.
    pub outcome: RepOutcome,
}

/// Receives notifications during a run. Every method has an empty default.
pub trait CompilationListener {
    /// The run starts with these reps, in declaration order.
    fn run_started(&mut self, _reps: &[ItemRep]) {}

    /// A rep starts, or resumes after a suspension.
    fn rep_started(&mut self, _rep: &ItemRep) {}

    /// A rep waits for another rep's compiled content.
    fn rep_suspended(&mut self, _rep: &ItemRep, _needs: &ItemRep) {}

    /// A rep has its final content.
    fn rep_ended(&mut self, _event: &RepEnded<'_>) {}

    /// An output file is about to be written with `content`. The previous
    /// file, if any, is still on disk.
    fn file_writing(&mut self, _rep: &ItemRep, _path: &Path, _content: &Content) {}

    /// An output file was written or found identical.
    fn file_written(&mut self, _rep: &ItemRep, _path: &Path, _action: FileAction) {}

    /// The run completed.
    fn run_ended(&mut self, _elapsed: Duration) {}
}

/// A listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl CompilationListener for NullListener {}

/// Forwards every notification to several listeners in order.
#[derive(Default)]
pub struct ListenerSet<'l> {
    listeners: Vec<&'l mut dyn CompilationListener>,
}

impl<'l> ListenerSet<'l> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    pub fn with(mut self, listener: &'l mut dyn CompilationListener) -> Self {
        self.listeners.push(listener);
        self
    }
}

impl CompilationListener for ListenerSet<'_> {
    fn run_started(&mut self, reps: &[ItemRep]) {
        for l in &mut self.listeners {
            l.run_started(reps);
        }
    }

    fn rep_started(&mut self, rep: &ItemRep) {
        for l in &mut self.listeners {
            l.rep_started(rep);
        }
    }

    fn rep_suspended(&mut self, rep: &ItemRep, needs: &ItemRep) {
        for l in &mut self.listeners {
            l.rep_suspended(rep, needs);
        }
    }

    fn rep_ended(&mut self, event: &RepEnded<'_>) {
        for l in &mut self.listeners {
            l.rep_ended(event);
        }
    }

    fn file_writing(&mut self, rep: &ItemRep, path: &Path, content: &Content) {
        for l in &mut self.listeners {
            l.file_writing(rep, path, content);
        }
    }

    fn file_written(&mut self, rep: &ItemRep, path: &Path, action: FileAction) {
        for l in &mut self.listeners {
            l.file_written(rep, path, action);
        }
    }

    fn run_ended(&mut self, elapsed: Duration) {
        for l in &mut self.listeners {
            l.run_ended(elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Identifier;

    #[derive(Default)]
    struct Counter {
        started: usize,
        ended: usize,
    }

    impl CompilationListener for Counter {
        fn rep_started(&mut self, _rep: &ItemRep) {
            self.started += 1;
        }

        fn run_ended(&mut self, _elapsed: Duration) {
            self.ended += 1;
        }
    }

    #[test]
    fn set_fans_out() {
        let rep = ItemRep::default_of(Identifier::new("/a.md").unwrap());
        let mut a = Counter::default();
        let mut b = Counter::default();
        {
            let mut set = ListenerSet::new().with(&mut a).with(&mut b);
            set.rep_started(&rep);
            set.run_ended(Duration::from_millis(5));
        }
        assert_eq!((a.started, a.ended), (1, 1));
        assert_eq!((b.started, b.ended), (1, 1));
    }

    #[test]
    fn file_action_labels() {
        assert_eq!(FileAction::Created.label(), "create");
        assert_eq!(FileAction::Updated.label(), "update");
        assert_eq!(FileAction::Identical.label(), "identical");
    }
}
