use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{info, warn};

use super::executor::{PreparedAction, PreparedStep, StepExecutor, StepOutcome};
use super::expr::ExpressionContext;
use super::run::{Run, StageOutcome, Trigger};
use super::status::{SkipReason, StageStatus, StepStatus};
use crate::error::{CirunError, Result};
use crate::output::StageProgress;
use crate::report::{RunReport, StepResult};
use crate::workflow::{topological_order, Stage, Step, StepAction, Workflow};

/// Drives one workflow through a run.
///
/// Stages are visited in topological order. A stage whose condition is false
/// for the triggering branch is skipped; so is a stage with any predecessor
/// that did not succeed. Otherwise its steps run in order until one fails.
///
/// Stages whose predecessors are all terminal form a batch; up to
/// `max_parallel` stages of a batch run at once. The run's status map is only
/// touched between batches.
pub struct PipelineRunner<E> {
    workflow: Workflow,
    executor: E,
    max_parallel: usize,
    environment: HashMap<String, String>,
    progress: StageProgress,
}

impl<E: StepExecutor> PipelineRunner<E> {
    pub fn new(workflow: Workflow, executor: E) -> Self {
        Self {
            workflow,
            executor,
            max_parallel: 1,
            environment: std::env::vars().collect(),
            progress: StageProgress::new(false),
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Values for `${{ secrets.* }}` and `${{ env.* }}`; defaults to the process environment.
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = StageProgress::new(enabled);
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Executes a run for `trigger` and returns its terminal report.
    ///
    /// # Errors
    ///
    /// Returns `BranchNotTriggered` when the workflow does not accept pushes to
    /// the branch. Step failures are not errors; they show up in the report.
    pub async fn run(&self, trigger: Trigger) -> Result<RunReport> {
        if !self.workflow.accepts_branch(&trigger.branch) {
            return Err(CirunError::BranchNotTriggered(trigger.branch));
        }

        let order = topological_order(&self.workflow)?;
        let mut run = Run::new(&self.workflow.name, trigger.clone(), &order);

        info!(
            "Starting run {} of '{}' for branch '{}' ({})",
            run.id(),
            self.workflow.name,
            trigger.branch,
            trigger.sha
        );

        loop {
            let ready: Vec<&Stage> = order
                .iter()
                .copied()
                .filter(|stage| {
                    run.status(&stage.id) == StageStatus::Pending
                        && stage.needs.iter().all(|dep| run.status(dep).is_terminal())
                })
                .collect();

            if ready.is_empty() {
                break;
            }

            let mut runnable = Vec::with_capacity(ready.len());
            for stage in ready {
                if let Some(reason) = self.gate(&run, stage, &trigger) {
                    info!("Skipping stage '{}': {}", stage.id, reason);
                    self.progress.skipped(stage.display_name(), &reason);
                    run.skip(&stage.id, reason)?;
                    continue;
                }

                run.transition(&stage.id, StageStatus::Running)?;
                runnable.push(stage);
            }

            let trigger = &trigger;
            let finished: Vec<(&Stage, StageOutcome)> = stream::iter(runnable)
                .map(|stage| async move { (stage, self.execute_stage(stage, trigger).await) })
                .buffer_unordered(self.max_parallel)
                .collect()
                .await;

            for (stage, outcome) in finished {
                run.complete(&stage.id, outcome)?;
            }
        }

        let report = run.into_report()?;
        info!(
            "Run {} finished: {}",
            report.run_id,
            if report.succeeded() { "succeeded" } else { "failed" }
        );

        Ok(report)
    }

    /// Returns why `stage` must be skipped, or `None` when it may run.
    ///
    /// The branch condition is checked before predecessors.
    fn gate(&self, run: &Run, stage: &Stage, trigger: &Trigger) -> Option<SkipReason> {
        if !stage.condition.evaluate(&trigger.branch) {
            return Some(SkipReason::BranchPredicate {
                condition: stage.condition.to_string(),
            });
        }

        stage.needs.iter().find_map(|dep| {
            let status = run.status(dep);
            (status != StageStatus::Succeeded).then(|| SkipReason::PredecessorNotSucceeded {
                stage: dep.clone(),
                status,
            })
        })
    }

    async fn execute_stage(&self, stage: &Stage, trigger: &Trigger) -> StageOutcome {
        let started_at = Utc::now();
        let pb = self.progress.start(stage.display_name());
        let ctx = ExpressionContext {
            trigger,
            environment: &self.environment,
        };

        let mut results = Vec::with_capacity(stage.steps.len());
        let mut failed = false;

        for step in &stage.steps {
            let label = step.label();

            if failed {
                results.push(not_executed(label, StepStatus::NotRun, None));
                continue;
            }

            if !step.condition.evaluate(&trigger.branch) {
                let detail = format!("condition `{}` is false", step.condition);
                results.push(not_executed(label, StepStatus::Skipped, Some(detail)));
                continue;
            }

            self.progress.step(&pb, stage.display_name(), &label);
            let started = Instant::now();

            let outcome = match prepare_step(&ctx, step, &label) {
                Ok(prepared) => self.executor.execute(&stage.id, &prepared, trigger).await,
                Err(e) => StepOutcome::failed(e.to_string()),
            };

            let status = if outcome.success {
                StepStatus::Succeeded
            } else {
                warn!(
                    "Stage '{}' step '{}' failed (exit code {:?})",
                    stage.id, label, outcome.exit_code
                );
                failed = true;
                StepStatus::Failed
            };

            results.push(StepResult {
                name: label,
                status,
                exit_code: outcome.exit_code,
                duration_secs: started.elapsed().as_secs_f64(),
                detail: outcome.detail,
                output_tail: outcome.output_tail,
            });
        }

        let status = if failed {
            StageStatus::Failed
        } else {
            StageStatus::Succeeded
        };
        self.progress.finish(pb, stage.display_name(), status);

        StageOutcome {
            status,
            steps: results,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

fn not_executed(name: String, status: StepStatus, detail: Option<String>) -> StepResult {
    StepResult {
        name,
        status,
        exit_code: None,
        duration_secs: 0.0,
        detail,
        output_tail: Vec::new(),
    }
}

fn prepare_step(ctx: &ExpressionContext<'_>, step: &Step, label: &str) -> Result<PreparedStep> {
    let action = match &step.action {
        StepAction::Run { script } => PreparedAction::Script(ctx.interpolate(script)?),
        StepAction::Uses { action, with } => PreparedAction::Action {
            name: action.clone(),
            with: with
                .iter()
                .map(|(key, value)| ctx.interpolate(value).map(|v| (key.clone(), v)))
                .collect::<Result<_>>()?,
        },
    };

    Ok(PreparedStep {
        label: label.to_string(),
        action,
    })
}
