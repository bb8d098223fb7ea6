//! Rule-driven compilation of a site.
//!
//! Rules turn every item into one or more reps, each with a plan of filter,
//! layout and snapshot steps. The [`Compiler`] reuses reps whose inputs are
//! unchanged since the previous run and compiles the others, suspending a
//! rep whenever it needs the compiled content of a rep that is not done yet.

#![warn(missing_docs)]

pub mod action;
pub mod compiler;
pub mod error;
pub mod filter;
pub mod filters;
pub mod listener;
mod output;
pub mod rules;

pub use action::{Action, ActionRecorder, ActionSequence};
pub use compiler::Compiler;
pub use error::{CompilationError, CompileError};
pub use filter::{ContextError, Filter, FilterContext, FilterError, FilterRegistry, StepOutcome};
pub use listener::{
    CompilationListener, FileAction, ListenerSet, NullListener, RepEnded, RepOutcome,
};
pub use rules::{CompileRule, LayoutRule, Params, RuleSet, Step, WriteTarget};
