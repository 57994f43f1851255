use std::path::PathBuf;
use std::process::Output;
use std::time::Instant;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::run::Trigger;

/// Number of trailing output lines kept per step.
const OUTPUT_TAIL_LINES: usize = 20;

/// A step with every expression already substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStep {
    pub label: String,
    pub action: PreparedAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedAction {
    Script(String),
    Action {
        name: String,
        with: IndexMap<String, String>,
    },
}

/// Result of executing a single step.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub detail: Option<String>,
    pub output_tail: Vec<String>,
}

impl StepOutcome {
    pub fn succeeded(detail: Option<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            detail,
            output_tail: Vec::new(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: None,
            detail: Some(detail.into()),
            output_tail: Vec::new(),
        }
    }
}

/// Runs a single prepared step.
///
/// Implementations report failures through [`StepOutcome`]; a step that
/// cannot even be started is a failed step, not an error.
#[allow(async_fn_in_trait)]
pub trait StepExecutor {
    async fn execute(&self, stage: &str, step: &PreparedStep, trigger: &Trigger) -> StepOutcome;
}

/// What to do with a `uses:` step that has no configured command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedActionPolicy {
    /// Treat the step as succeeded and log a warning
    #[default]
    Ignore,
    Fail,
}

/// Executes steps as local processes.
///
/// `run:` scripts are passed as the last argument to `shell`. `uses:` steps
/// run the command mapped to the action name (without `@version`), with each
/// `with` parameter exported as `INPUT_<NAME>`.
pub struct ShellExecutor {
    shell: Vec<String>,
    working_dir: Option<PathBuf>,
    actions: IndexMap<String, String>,
    unmapped_actions: UnmappedActionPolicy,
}

impl ShellExecutor {
    pub fn new(shell: Vec<String>) -> Self {
        Self {
            shell,
            working_dir: None,
            actions: IndexMap::new(),
            unmapped_actions: UnmappedActionPolicy::default(),
        }
    }

    pub fn with_working_dir(mut self, working_dir: Option<PathBuf>) -> Self {
        self.working_dir = working_dir;
        self
    }

    pub fn with_actions(mut self, actions: IndexMap<String, String>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_unmapped_actions(mut self, policy: UnmappedActionPolicy) -> Self {
        self.unmapped_actions = policy;
        self
    }

    fn command(&self, script: &str, trigger: &Trigger) -> Option<Command> {
        let (program, args) = self.shell.split_first()?;

        let mut command = Command::new(program);
        command
            .args(args)
            .arg(script)
            .env("CI", "true")
            .env("GITHUB_EVENT_NAME", "push")
            .env("GITHUB_REF", trigger.git_ref())
            .env("GITHUB_REF_NAME", &trigger.branch)
            .env("GITHUB_SHA", &trigger.sha)
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        Some(command)
    }

    async fn spawn(&self, stage: &str, label: &str, mut command: Command) -> StepOutcome {
        let started = Instant::now();

        let output: Output = match command.output().await {
            Ok(output) => output,
            Err(e) => return StepOutcome::failed(format!("failed to start process: {e}")),
        };

        let output_tail = collect_output(stage, label, &output);
        debug!(
            "[{stage}] {label} exited with {:?} after {:.1}s",
            output.status.code(),
            started.elapsed().as_secs_f64()
        );

        StepOutcome {
            success: output.status.success(),
            exit_code: output.status.code(),
            detail: None,
            output_tail,
        }
    }
}

impl StepExecutor for ShellExecutor {
    async fn execute(&self, stage: &str, step: &PreparedStep, trigger: &Trigger) -> StepOutcome {
        match &step.action {
            PreparedAction::Script(script) => match self.command(script, trigger) {
                Some(command) => self.spawn(stage, &step.label, command).await,
                None => StepOutcome::failed("no shell configured"),
            },
            PreparedAction::Action { name, with } => {
                let base = action_base_name(name);

                let Some(mapped) = self.actions.get(base) else {
                    return match self.unmapped_actions {
                        UnmappedActionPolicy::Ignore => {
                            warn!("[{stage}] no command configured for action '{base}', skipping it");
                            StepOutcome::succeeded(Some(format!(
                                "action '{base}' has no local command; treated as succeeded"
                            )))
                        }
                        UnmappedActionPolicy::Fail => {
                            StepOutcome::failed(format!("no command configured for action '{base}'"))
                        }
                    };
                };

                let Some(mut command) = self.command(mapped, trigger) else {
                    return StepOutcome::failed("no shell configured");
                };
                for (key, value) in with {
                    command.env(input_env_name(key), value);
                }

                self.spawn(stage, &step.label, command).await
            }
        }
    }
}

/// Succeeds every step without running anything.
pub struct DryRunExecutor;

impl StepExecutor for DryRunExecutor {
    async fn execute(&self, stage: &str, step: &PreparedStep, _trigger: &Trigger) -> StepOutcome {
        debug!("[{stage}] dry run: {}", step.label);
        StepOutcome::succeeded(Some("dry run".to_string()))
    }
}

/// `actions/checkout@v4` -> `actions/checkout`
fn action_base_name(action: &str) -> &str {
    action.split_once('@').map_or(action, |(base, _)| base)
}

/// `python-version` -> `INPUT_PYTHON-VERSION`
/// `with` key as an environment variable name. Hyphens are kept, so a mapped
/// command reads `python-version` with `printenv INPUT_PYTHON-VERSION`.
fn input_env_name(key: &str) -> String {
    format!("INPUT_{}", key.replace(' ', "_").to_uppercase())
}

fn collect_output(stage: &str, label: &str, output: &Output) -> Vec<String> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let lines: Vec<String> = stdout
        .lines()
        .chain(stderr.lines())
        .inspect(|line| debug!("[{stage}] {label} | {line}"))
        .map(str::to_string)
        .collect();

    let skip = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines.into_iter().skip(skip).collect()
}
