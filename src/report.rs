use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::{SkipReason, StageStatus, StepStatus};

/// Terminal, immutable record of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub workflow: String,
    pub branch: String,
    pub sha: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    /// True when no stage failed. Skipped stages do not fail a run.
    pub fn succeeded(&self) -> bool {
        self.stages.iter().all(|s| s.status != StageStatus::Failed)
    }

    pub fn stage(&self, id: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<StageStatus> {
        self.stage(id).map(|s| s.status)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub id: String,
    pub name: Option<String>,
    pub needs: Vec<String>,
    pub condition: String,
    pub status: StageStatus,
    pub skip_reason: Option<SkipReason>,
    pub duration_secs: f64,
    pub steps: Vec<StepResult>,
}

impl StageReport {
    /// The step that failed this stage, if any.
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub duration_secs: f64,
    /// Extra context, e.g. why an action step was bypassed
    pub detail: Option<String>,
    /// Last lines of combined stdout/stderr
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_tail: Vec<String>,
}
