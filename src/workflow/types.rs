use indexmap::IndexMap;

use super::predicate::BranchPredicate;

/// A push-triggered workflow.
///
/// Holds the stage graph in declaration order. Dependency edges are stored on
/// each stage as the ids of its predecessors.
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name (e.g., "ci")
    pub name: String,
    /// Branches whose pushes create a run; empty accepts every branch
    pub triggers: Vec<String>,
    /// Stages in declaration order
    pub stages: Vec<Stage>,
}

impl Workflow {
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Whether a push to `branch` creates a run of this workflow.
    pub fn accepts_branch(&self, branch: &str) -> bool {
        self.triggers.is_empty() || self.triggers.iter().any(|t| t == branch)
    }
}

/// A named unit of work with ordered steps, predecessors and a branch gate.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Stage identifier as written under `jobs`
    pub id: String,
    /// Optional display name
    pub name: Option<String>,
    /// Ids of stages that must succeed before this one runs
    pub needs: Vec<String>,
    /// Branch gate; `Always` when the stage has no `if`
    pub condition: BranchPredicate,
    /// Steps, executed in order
    pub steps: Vec<Step>,
}

impl Stage {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: Option<String>,
    /// Step-level gate; a false gate skips only this step
    pub condition: BranchPredicate,
    pub action: StepAction,
}

impl Step {
    /// Human-readable label, derived from the action when the step has no name.
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }

        match &self.action {
            StepAction::Uses { action, .. } => action.clone(),
            StepAction::Run { script } => {
                let first_line = script.lines().next().unwrap_or("").trim();
                format!("Run {first_line}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Invoke a named external action with a parameter mapping
    Uses {
        action: String,
        with: IndexMap<String, String>,
    },
    /// Run an inline shell script
    Run { script: String },
}
