//! Decides whether an item rep or layout must be recompiled, and why.
//!
//! The checker compares the checksums stored by the previous run with the
//! current ones, and walks the previous run's dependency graph to find
//! reps whose inputs changed indirectly.

#![warn(missing_docs)]

pub mod checker;
pub mod plan;
pub mod reason;

pub use checker::{Outdatable, OutdatednessChecker};
pub use plan::{PlanIndex, PlanSummary};
pub use reason::Reason;
