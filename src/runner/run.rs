use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;

use super::status::{SkipReason, StageStatus};
use crate::error::{CirunError, Result};
use crate::report::{RunReport, StageReport, StepResult};
use crate::workflow::Stage;

/// The push event that creates a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub branch: String,
    pub sha: String,
}

impl Trigger {
    pub fn push(branch: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            sha: sha.into(),
        }
    }

    /// Fully qualified ref, e.g. `refs/heads/main`.
    pub fn git_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }
}

/// What executing a stage produced.
///
/// `started_at` and `finished_at` bound the stage's own steps, not the time it
/// spent queued behind other stages of its batch.
#[derive(Debug)]
pub struct StageOutcome {
    pub status: StageStatus,
    pub steps: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StageRecord {
    name: Option<String>,
    needs: Vec<String>,
    condition: String,
    status: StageStatus,
    skip_reason: Option<SkipReason>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    steps: Vec<StepResult>,
}

/// One invocation of a workflow.
///
/// Tracks every stage's status in topological order. Status changes go through
/// [`Run::transition`], which rejects moves the stage lifecycle does not allow.
#[derive(Debug)]
pub struct Run {
    id: String,
    workflow: String,
    trigger: Trigger,
    started_at: DateTime<Utc>,
    stages: IndexMap<String, StageRecord>,
}

impl Run {
    pub fn new(workflow: &str, trigger: Trigger, stages: &[&Stage]) -> Self {
        let started_at = Utc::now();
        let id = format!("{}-{}", trigger.branch.replace('/', "-"), started_at.timestamp_millis());

        let stages = stages
            .iter()
            .map(|stage| {
                let record = StageRecord {
                    name: stage.name.clone(),
                    needs: stage.needs.clone(),
                    condition: stage.condition.to_string(),
                    status: StageStatus::Pending,
                    skip_reason: None,
                    started_at: None,
                    finished_at: None,
                    steps: Vec::new(),
                };
                (stage.id.clone(), record)
            })
            .collect();

        Self {
            id,
            workflow: workflow.to_string(),
            trigger,
            started_at,
            stages,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Status of `stage`; unknown stages read as pending.
    pub fn status(&self, stage: &str) -> StageStatus {
        self.stages
            .get(stage)
            .map_or(StageStatus::Pending, |record| record.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.stages.values().all(|record| record.status.is_terminal())
    }

    pub fn transition(&mut self, stage: &str, to: StageStatus) -> Result<()> {
        let record = self
            .stages
            .get_mut(stage)
            .ok_or_else(|| CirunError::Workflow(format!("run has no stage '{stage}'")))?;

        if !record.status.can_transition_to(to) {
            return Err(CirunError::InvalidTransition {
                stage: stage.to_string(),
                from: record.status,
                to,
            });
        }

        debug!("Stage '{}': {} -> {}", stage, record.status, to);

        let now = Utc::now();
        if to == StageStatus::Running {
            record.started_at = Some(now);
        }
        if to.is_terminal() {
            record.finished_at = Some(now);
        }
        record.status = to;

        Ok(())
    }

    pub fn skip(&mut self, stage: &str, reason: SkipReason) -> Result<()> {
        self.transition(stage, StageStatus::Skipped)?;
        if let Some(record) = self.stages.get_mut(stage) {
            record.skip_reason = Some(reason);
        }
        Ok(())
    }

    /// Moves a running stage to its terminal status and stores its step results.
    ///
    /// The outcome's timestamps replace the ones stamped by the transitions.
    pub fn complete(&mut self, stage: &str, outcome: StageOutcome) -> Result<()> {
        self.transition(stage, outcome.status)?;
        if let Some(record) = self.stages.get_mut(stage) {
            record.started_at = Some(outcome.started_at);
            record.finished_at = Some(outcome.finished_at);
            record.steps = outcome.steps;
        }
        Ok(())
    }

    /// Freezes a terminal run into its report.
    ///
    /// # Errors
    ///
    /// Returns an error naming the stages that are still pending or running.
    pub fn into_report(self) -> Result<RunReport> {
        if !self.is_terminal() {
            let unfinished: Vec<&str> = self
                .stages
                .iter()
                .filter(|(_, record)| !record.status.is_terminal())
                .map(|(id, _)| id.as_str())
                .collect();

            return Err(CirunError::Workflow(format!(
                "run finished with unfinished stages: {}",
                unfinished.join(", ")
            )));
        }

        let stages = self
            .stages
            .into_iter()
            .map(|(id, record)| {
                #[allow(clippy::cast_precision_loss)]
                let duration_secs = match (record.started_at, record.finished_at) {
                    (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
                    _ => 0.0,
                };

                StageReport {
                    id,
                    name: record.name,
                    needs: record.needs,
                    condition: record.condition,
                    status: record.status,
                    skip_reason: record.skip_reason,
                    duration_secs,
                    steps: record.steps,
                }
            })
            .collect();

        Ok(RunReport {
            run_id: self.id,
            workflow: self.workflow,
            branch: self.trigger.branch,
            sha: self.trigger.sha,
            started_at: self.started_at,
            finished_at: Utc::now(),
            stages,
        })
    }
}
