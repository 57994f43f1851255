use thiserror::Error;

use crate::runner::StageStatus;

#[derive(Error, Debug)]
pub enum CirunError {
    #[error("Invalid workflow: {0}")]
    Workflow(String),

    #[error("Stage '{stage}' needs unknown stage '{dependency}'")]
    UnknownDependency { stage: String, dependency: String },

    #[error("Dependency cycle between stages: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Invalid condition '{expression}': {reason}")]
    InvalidPredicate { expression: String, reason: String },

    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Branch '{0}' does not trigger this workflow")]
    BranchNotTriggered(String),

    #[error("Stage '{stage}' cannot move from {from} to {to}")]
    InvalidTransition {
        stage: String,
        from: StageStatus,
        to: StageStatus,
    },

    #[error("History error: {0}")]
    History(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CirunError>;
