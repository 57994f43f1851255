use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use super::graph::validate_graph;
use super::predicate::BranchPredicate;
use super::types::{Stage, Step, StepAction, Workflow};
use crate::error::{CirunError, Result};

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    name: Option<String>,
    #[serde(rename = "on")]
    trigger: Option<RawTrigger>,
    jobs: IndexMap<String, RawJob>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTrigger {
    Event(String),
    Events(Vec<String>),
    Map(IndexMap<String, Option<RawPush>>),
}

#[derive(Debug, Default, Deserialize)]
struct RawPush {
    #[serde(default)]
    branches: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    name: Option<String>,
    #[serde(default)]
    needs: OneOrMany,
    #[serde(rename = "if")]
    condition: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(one) => vec![one],
            OneOrMany::Many(many) => many,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStep {
    name: Option<String>,
    #[serde(rename = "if")]
    condition: Option<String>,
    uses: Option<String>,
    run: Option<String>,
    #[serde(default)]
    with: IndexMap<String, serde_yaml::Value>,
}

/// Reads and parses a workflow file.
pub fn load_workflow(path: &Path) -> Result<Workflow> {
    let contents = std::fs::read_to_string(path)?;
    debug!("Loaded workflow from: {}", path.display());
    parse_workflow(&contents)
}

/// Parses a workflow document and validates its stage graph.
///
/// Rejects workflows without a push trigger, stages without steps, steps that
/// set both or neither of `uses`/`run`, unparseable `if:` conditions, unknown
/// `needs` and dependency cycles.
pub fn parse_workflow(source: &str) -> Result<Workflow> {
    let raw: RawWorkflow = serde_yaml::from_str(source)?;

    let triggers = match raw.trigger {
        Some(trigger) => push_branches(trigger)?,
        None => return Err(CirunError::Workflow("missing `on` trigger".into())),
    };

    if raw.jobs.is_empty() {
        return Err(CirunError::Workflow("workflow declares no jobs".into()));
    }

    let stages = raw
        .jobs
        .into_iter()
        .map(|(id, job)| convert_job(id, job))
        .collect::<Result<Vec<_>>>()?;

    let workflow = Workflow {
        name: raw.name.unwrap_or_else(|| "workflow".to_string()),
        triggers,
        stages,
    };

    validate_graph(&workflow)?;

    Ok(workflow)
}

fn push_branches(trigger: RawTrigger) -> Result<Vec<String>> {
    let not_push = || CirunError::Workflow("workflow is not triggered by push".into());

    match trigger {
        RawTrigger::Event(event) if event == "push" => Ok(Vec::new()),
        RawTrigger::Events(events) if events.iter().any(|e| e == "push") => Ok(Vec::new()),
        RawTrigger::Map(mut events) => events
            .shift_remove("push")
            .map(|push| push.unwrap_or_default().branches)
            .ok_or_else(not_push),
        _ => Err(not_push()),
    }
}

fn convert_job(id: String, job: RawJob) -> Result<Stage> {
    if job.steps.is_empty() {
        return Err(CirunError::Workflow(format!("stage '{id}' has no steps")));
    }

    let condition = parse_condition(job.condition.as_deref())?;

    let steps = job
        .steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| convert_step(&id, index, step))
        .collect::<Result<Vec<_>>>()?;

    Ok(Stage {
        id,
        name: job.name,
        needs: job.needs.into(),
        condition,
        steps,
    })
}

fn convert_step(stage: &str, index: usize, step: RawStep) -> Result<Step> {
    let action = match (step.uses, step.run) {
        (Some(action), None) => StepAction::Uses {
            action,
            with: step
                .with
                .into_iter()
                .map(|(key, value)| (key, yaml_scalar(value)))
                .collect(),
        },
        (None, Some(script)) => StepAction::Run { script },
        _ => {
            return Err(CirunError::Workflow(format!(
                "step {} of stage '{stage}' must set exactly one of `uses` or `run`",
                index + 1
            )))
        }
    };

    Ok(Step {
        name: step.name,
        condition: parse_condition(step.condition.as_deref())?,
        action,
    })
}

fn parse_condition(condition: Option<&str>) -> Result<BranchPredicate> {
    condition.map_or(Ok(BranchPredicate::Always), BranchPredicate::parse)
}

fn yaml_scalar(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
