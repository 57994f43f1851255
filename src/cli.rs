use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{Config, OutputFormat};
use crate::history::RunHistory;
use crate::output;
use crate::report::RunReport;
use crate::runner::{DryRunExecutor, PipelineRunner, ShellExecutor, Trigger};
use crate::workflow::{builtin_workflow, lint, load_workflow, Workflow};

const UNKNOWN_SHA: &str = "0000000000000000000000000000000000000000";

#[derive(Parser)]
#[command(name = "cirun")]
#[command(author, version, about = "Local CI Workflow Runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./cirun.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the run report to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Report format for --output
    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow for a push to a branch
    Run {
        #[arg(short, long, env = "CIRUN_BRANCH")]
        branch: String,

        #[arg(short, long, env = "CIRUN_SHA", default_value = UNKNOWN_SHA)]
        sha: String,

        /// Workflow file (defaults to the built-in workflow)
        #[arg(short, long)]
        workflow: Option<PathBuf>,

        /// Maximum number of stages running at once
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Evaluate gating without executing any step
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        #[arg(long, default_value_t = false)]
        no_history: bool,
    },
    /// Show stage order, gating and unreachable stages for a branch
    Plan {
        #[arg(short, long, env = "CIRUN_BRANCH")]
        branch: String,

        #[arg(short, long)]
        workflow: Option<PathBuf>,
    },
    /// List previous runs
    History {
        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        #[arg(short, long)]
        workflow: Option<PathBuf>,
    },
}

impl Cli {
    fn load_workflow(path: Option<&Path>) -> Result<Workflow> {
        match path {
            Some(path) => load_workflow(path)
                .with_context(|| format!("Failed to load workflow: {}", path.display())),
            None => builtin_workflow().context("Built-in workflow is invalid"),
        }
    }

    fn write_report(&self, report: &RunReport, config: &Config) -> Result<()> {
        let Some(output_path) = &self.output else {
            return Ok(());
        };

        let format = self.format.unwrap_or(config.output.format);
        let mut file = std::fs::File::create(output_path)
            .with_context(|| format!("Failed to create report file: {}", output_path.display()))?;
        output::export_report(report, format, self.pretty || config.output.pretty, &mut file)?;

        info!("Report written to: {}", output_path.display());
        Ok(())
    }

    /// Process environment with configured secrets layered on top.
    fn environment(config: &Config) -> HashMap<String, String> {
        let mut environment: HashMap<String, String> = std::env::vars().collect();
        environment.extend(config.secrets.iter().map(|(k, v)| (k.clone(), v.clone())));
        environment
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_run(
        &self,
        config: &Config,
        branch: &str,
        sha: &str,
        workflow: Option<&Path>,
        jobs: Option<usize>,
        dry_run: bool,
        no_history: bool,
    ) -> Result<bool> {
        let workflow = Self::load_workflow(workflow.or(config.workflow.as_deref()))?;
        let trigger = Trigger::push(branch, sha);
        let max_parallel = jobs.unwrap_or(config.runner.max_parallel);

        info!(
            "Running workflow '{}' for branch '{}' (max parallel stages: {})",
            workflow.name, branch, max_parallel
        );

        let report = if dry_run {
            PipelineRunner::new(workflow, DryRunExecutor)
                .with_environment(Self::environment(config))
                .with_max_parallel(max_parallel)
                .with_progress(true)
                .run(trigger)
                .await?
        } else {
            let executor = ShellExecutor::new(config.runner.shell.clone())
                .with_working_dir(config.runner.working_dir.clone())
                .with_actions(config.actions.clone())
                .with_unmapped_actions(config.runner.unmapped_actions);

            PipelineRunner::new(workflow, executor)
                .with_environment(Self::environment(config))
                .with_max_parallel(max_parallel)
                .with_progress(true)
                .run(trigger)
                .await?
        };

        output::print_summary(&report);
        self.write_report(&report, config)?;

        if !dry_run {
            let record = RunHistory::new(&report.workflow, config.runner.history && !no_history)
                .and_then(|mut history| history.record(&report));
            if let Err(e) = record {
                warn!("Failed to record run history: {e}");
            }
        }

        Ok(report.succeeded())
    }

    async fn execute_plan(
        &self,
        config: &Config,
        branch: &str,
        workflow: Option<&Path>,
    ) -> Result<bool> {
        let workflow = Self::load_workflow(workflow.or(config.workflow.as_deref()))?;
        let findings = lint(&workflow);

        let runner =
            PipelineRunner::new(workflow, DryRunExecutor).with_environment(Self::environment(config));
        let predicted = runner.run(Trigger::push(branch, UNKNOWN_SHA)).await?;

        for finding in &findings {
            let status = predicted
                .status_of(&finding.stage)
                .map_or_else(|| "unknown".to_string(), |s| s.to_string());
            warn!(
                "Stage '{}' {} (on '{}': {})",
                finding.stage, finding.message, branch, status
            );
        }

        output::print_plan(runner.workflow(), &predicted, &findings);
        self.write_report(&predicted, config)?;

        Ok(true)
    }

    fn execute_history(
        config: &Config,
        branch: Option<&str>,
        limit: usize,
        workflow: Option<&Path>,
    ) -> Result<bool> {
        let workflow = Self::load_workflow(workflow.or(config.workflow.as_deref()))?;
        let history = RunHistory::new(&workflow.name, true)?;

        output::print_history(&history.recent(branch, limit));
        Ok(true)
    }

    /// Runs the selected command; the exit code is a failure when a run had a failed stage.
    pub async fn execute(&self) -> Result<ExitCode> {
        Ok(if self.dispatch().await? {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }

    async fn dispatch(&self) -> Result<bool> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Run {
                branch,
                sha,
                workflow,
                jobs,
                dry_run,
                no_history,
            } => {
                self.execute_run(
                    &config,
                    branch,
                    sha,
                    workflow.as_deref(),
                    *jobs,
                    *dry_run,
                    *no_history,
                )
                .await
            }
            Commands::Plan { branch, workflow } => {
                self.execute_plan(&config, branch, workflow.as_deref()).await
            }
            Commands::History {
                branch,
                limit,
                workflow,
            } => Self::execute_history(&config, branch.as_deref(), *limit, workflow.as_deref()),
        }
    }
}
