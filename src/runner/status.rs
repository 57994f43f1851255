use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Allowed moves: pending to running or skipped, running to succeeded or failed.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Skipped)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Why a stage was skipped without running its steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The stage's branch condition is false for the triggering branch
    BranchPredicate { condition: String },
    /// A predecessor ended in a status other than succeeded
    PredecessorNotSucceeded { stage: String, status: StageStatus },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BranchPredicate { condition } => write!(f, "condition `{condition}` is false"),
            Self::PredecessorNotSucceeded { stage, status } => {
                write!(f, "needs '{stage}', which {status}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Step condition was false
    Skipped,
    /// An earlier step in the stage failed
    NotRun,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::NotRun => "not run",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
        assert!(StageStatus::Succeeded.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Running));
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Skipped));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Succeeded));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Failed));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!StageStatus::Pending.can_transition_to(StageStatus::Succeeded));
        assert!(!StageStatus::Running.can_transition_to(StageStatus::Skipped));
        assert!(!StageStatus::Succeeded.can_transition_to(StageStatus::Running));
        assert!(!StageStatus::Skipped.can_transition_to(StageStatus::Running));
        assert!(!StageStatus::Failed.can_transition_to(StageStatus::Failed));
    }

    #[test]
    fn test_skip_reason_serializes_with_kind() {
        let reason = SkipReason::PredecessorNotSucceeded {
            stage: "check".to_string(),
            status: StageStatus::Failed,
        };
        let json = serde_json::to_string(&reason).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"predecessor_not_succeeded","stage":"check","status":"failed"}"#
        );
        assert_eq!(reason.to_string(), "needs 'check', which failed");
    }
}
