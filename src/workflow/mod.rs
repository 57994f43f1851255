mod builtin;
mod graph;
mod parse;
mod predicate;
mod types;

pub use builtin::builtin_workflow;
pub use graph::{lint, topological_order, LintFinding};
pub use parse::load_workflow;
pub use types::{Stage, Step, StepAction, Workflow};

#[cfg(test)]
pub use parse::parse_workflow;
#[cfg(test)]
pub use predicate::BranchPredicate;
