use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use super::styling::{bright, bright_yellow, cyan, dim, outcome};
use super::tables::{create_table, cyan_header, duration_cell, stage_status_cell, step_status_cell};
use crate::history::HistoryEntry;
use crate::report::RunReport;
use crate::runner::StageStatus;
use crate::workflow::{LintFinding, Workflow};

/// Prints a human-readable summary of a finished run to stdout.
///
/// Shows an overview, one row per stage with its status and skip reason, the
/// steps of every stage that ran, and the output tail of each failed step.
pub fn print_summary(report: &RunReport) {
    println!("{}", render_summary(report));
}

/// Prints stage order, gating and predicted outcome for a branch.
pub fn print_plan(workflow: &Workflow, predicted: &RunReport, findings: &[LintFinding]) {
    println!("{}", render_plan(workflow, predicted, findings));
}

pub fn print_history(entries: &[HistoryEntry]) {
    println!("{}", render_history(entries));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn count_status(report: &RunReport, status: StageStatus) -> usize {
    report.stages.iter().filter(|s| s.status == status).count()
}

fn reason_cell(report_stage: &crate::report::StageReport) -> Cell {
    match (&report_stage.skip_reason, report_stage.failed_step()) {
        (Some(reason), _) => Cell::new(reason).fg(TableColor::DarkGrey),
        (None, Some(step)) => Cell::new(format!("step '{}' failed", step.name)).fg(TableColor::Red),
        (None, None) => Cell::new(""),
    }
}

fn render_summary(report: &RunReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");

    let result = if report.succeeded() {
        outcome("succeeded", true)
    } else {
        outcome("failed", false)
    };

    let _ = write!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Workflow:"),
        cyan(&report.workflow),
        dim("Branch:"),
        cyan(&report.branch),
        dim("Commit:"),
        dim(&report.sha),
        dim("Result:"),
        result,
        dim("Stages:"),
        bright_yellow(format!(
            "{} succeeded, {} failed, {} skipped",
            count_status(report, StageStatus::Succeeded),
            count_status(report, StageStatus::Failed),
            count_status(report, StageStatus::Skipped)
        )),
        dim("Started:"),
        dim(report.started_at.format("%Y-%m-%d %H:%M:%S UTC")),
        dim("Duration:"),
        dim(format!("{:.1}s", report.duration_secs()))
    );

    add_section_header(&mut output, "🧱", "Stages");

    let mut stages_table = create_table();
    stages_table.set_header(cyan_header(&["Stage", "Needs", "Condition", "Status", "Duration", "Reason"]));

    for stage in &report.stages {
        stages_table.add_row(vec![
            Cell::new(&stage.id),
            Cell::new(if stage.needs.is_empty() {
                "-".to_string()
            } else {
                stage.needs.join(", ")
            }),
            Cell::new(&stage.condition),
            stage_status_cell(stage.status),
            duration_cell(stage.duration_secs),
            reason_cell(stage),
        ]);
    }

    let _ = write!(output, "{stages_table}\n\n");

    for stage in report.stages.iter().filter(|s| !s.steps.is_empty()) {
        add_section_header(&mut output, "🔧", &format!("Steps: {}", stage.id));

        let mut steps_table = create_table();
        steps_table.set_header(cyan_header(&["#", "Step", "Status", "Exit", "Duration", "Detail"]));

        for (idx, step) in stage.steps.iter().enumerate() {
            steps_table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(&step.name),
                step_status_cell(step.status),
                Cell::new(step.exit_code.map_or_else(|| "-".to_string(), |c| c.to_string())),
                duration_cell(step.duration_secs),
                Cell::new(step.detail.as_deref().unwrap_or("")),
            ]);
        }

        let _ = write!(output, "{steps_table}\n\n");
    }

    for stage in &report.stages {
        let Some(step) = stage.failed_step() else {
            continue;
        };
        if step.output_tail.is_empty() {
            continue;
        }

        add_section_header(&mut output, "❌", &format!("Output: {} / {}", stage.id, step.name));
        for line in &step.output_tail {
            let _ = writeln!(output, "  {} {}", dim("│"), line);
        }
        output.push('\n');
    }

    output
}

fn render_plan(workflow: &Workflow, predicted: &RunReport, findings: &[LintFinding]) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "🗺", "Plan");
    let _ = write!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Workflow:"),
        cyan(&workflow.name),
        dim("Branch:"),
        cyan(&predicted.branch),
        dim("Triggers:"),
        if workflow.triggers.is_empty() {
            dim("any branch".to_string())
        } else {
            dim(workflow.triggers.join(", "))
        }
    );

    let mut plan_table = create_table();
    plan_table.set_header(cyan_header(&["#", "Stage", "Needs", "Condition", "Steps", "Predicted"]));

    for (idx, stage) in predicted.stages.iter().enumerate() {
        plan_table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&stage.id),
            Cell::new(stage.needs.join(", ")),
            Cell::new(&stage.condition),
            Cell::new(workflow.stage(&stage.id).map_or(0, |s| s.steps.len())),
            stage_status_cell(stage.status),
        ]);
    }

    let _ = write!(output, "{plan_table}\n\n");

    add_section_header(&mut output, "⚠️", "Findings");
    if findings.is_empty() {
        let _ = writeln!(output, "  {}", outcome("No unreachable stages", true));
    } else {
        for finding in findings {
            let _ = writeln!(
                output,
                "  {} {} {}",
                bright_yellow("•"),
                bright(&finding.stage),
                finding.message
            );
        }
    }

    output
}

fn render_history(entries: &[HistoryEntry]) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "🕘", "Run History");

    if entries.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No runs recorded."));
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&["Run", "Branch", "Commit", "Started", "Result", "Stages"]));

    for entry in entries {
        let result = if entry.succeeded {
            Cell::new("succeeded").fg(TableColor::Green)
        } else {
            Cell::new("failed").fg(TableColor::Red)
        };

        let stages = entry
            .stages
            .iter()
            .map(|(id, status)| format!("{id}={status}"))
            .collect::<Vec<_>>()
            .join("\n");

        table.add_row(vec![
            Cell::new(&entry.run_id),
            Cell::new(&entry.branch),
            Cell::new(entry.sha.chars().take(8).collect::<String>()),
            Cell::new(entry.started_at.format("%Y-%m-%d %H:%M")),
            result,
            Cell::new(stages),
        ]);
    }

    let _ = write!(output, "{table}\n");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{StageReport, StepResult};
    use crate::runner::{SkipReason, StepStatus};
    use crate::workflow::builtin_workflow;
    use chrono::Utc;
    use indexmap::IndexMap;

    fn create_stage(id: &str, status: StageStatus, steps: Vec<StepResult>) -> StageReport {
        StageReport {
            id: id.to_string(),
            name: None,
            needs: vec![],
            condition: "always".to_string(),
            status,
            skip_reason: None,
            duration_secs: 3.0,
            steps,
        }
    }

    fn create_step(name: &str, status: StepStatus, output_tail: &[&str]) -> StepResult {
        StepResult {
            name: name.to_string(),
            status,
            exit_code: Some(if status == StepStatus::Failed { 2 } else { 0 }),
            duration_secs: 1.5,
            detail: None,
            output_tail: output_tail.iter().map(ToString::to_string).collect(),
        }
    }

    fn create_report(stages: Vec<StageReport>) -> RunReport {
        RunReport {
            run_id: "dev-1".to_string(),
            workflow: "ci".to_string(),
            branch: "dev".to_string(),
            sha: "abc123".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            stages,
        }
    }

    #[test]
    fn test_render_summary_overview() {
        let report = create_report(vec![create_stage(
            "check",
            StageStatus::Succeeded,
            vec![create_step("Type check", StepStatus::Succeeded, &[])],
        )]);

        let output = render_summary(&report);

        assert!(output.contains("Overview"));
        assert!(output.contains("ci"));
        assert!(output.contains("dev"));
        assert!(output.contains("1 succeeded, 0 failed, 0 skipped"));
        assert!(output.contains("Steps: check"));
        assert!(output.contains("Type check"));
        assert!(output.contains("1.5s"));
    }

    #[test]
    fn test_render_summary_shows_failure_output() {
        let mut skipped = create_stage("build_docs", StageStatus::Skipped, vec![]);
        skipped.skip_reason = Some(SkipReason::PredecessorNotSucceeded {
            stage: "check".to_string(),
            status: StageStatus::Failed,
        });

        let report = create_report(vec![
            create_stage(
                "check",
                StageStatus::Failed,
                vec![
                    create_step("Check formatting", StepStatus::Failed, &["would reformat main.py"]),
                    create_step("Type check", StepStatus::NotRun, &[]),
                ],
            ),
            skipped,
        ]);

        let output = render_summary(&report);

        assert!(output.contains("failed"));
        assert!(output.contains("step 'Check formatting' failed"));
        assert!(output.contains("needs 'check', which failed"));
        assert!(output.contains("Output: check / Check formatting"));
        assert!(output.contains("would reformat main.py"));
        assert!(output.contains("not run"));
        // Skipped stages have no steps section
        assert!(!output.contains("Steps: build_docs"));
    }

    #[test]
    fn test_render_plan_lists_findings() {
        let workflow = builtin_workflow().unwrap();
        let report = create_report(vec![
            create_stage("check", StageStatus::Succeeded, vec![]),
            create_stage("deploy", StageStatus::Skipped, vec![]),
        ]);
        let findings = vec![LintFinding {
            stage: "deploy".to_string(),
            message: "never runs: requires `branch == main`".to_string(),
        }];

        let output = render_plan(&workflow, &report, &findings);

        assert!(output.contains("Plan"));
        assert!(output.contains("master, main, dev"));
        assert!(output.contains("never runs"));
        assert!(output.contains("skipped"));
    }

    #[test]
    fn test_render_plan_without_findings() {
        let workflow = builtin_workflow().unwrap();
        let report = create_report(vec![]);

        let output = render_plan(&workflow, &report, &[]);
        assert!(output.contains("No unreachable stages"));
    }

    #[test]
    fn test_render_history() {
        let entries = vec![HistoryEntry {
            run_id: "main-42".to_string(),
            workflow: "ci".to_string(),
            branch: "main".to_string(),
            sha: "0123456789abcdef".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            succeeded: false,
            stages: IndexMap::from([
                ("check".to_string(), StageStatus::Succeeded),
                ("deploy".to_string(), StageStatus::Skipped),
            ]),
        }];

        let output = render_history(&entries);

        assert!(output.contains("main-42"));
        assert!(output.contains("01234567"));
        assert!(!output.contains("0123456789abcdef"));
        assert!(output.contains("deploy=skipped"));
    }

    #[test]
    fn test_render_empty_history() {
        assert!(render_history(&[]).contains("No runs recorded"));
    }
}
