use anyhow::Result;
use std::io::Write;

use crate::config::OutputFormat;
use crate::report::RunReport;

/// Exports a run report in a machine-readable format.
///
/// - JSON: the full report, including step results
/// - CSV: one row per stage
pub fn export_report(
    report: &RunReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary | OutputFormat::Json => export_json(report, pretty, output),
        OutputFormat::Csv => export_csv(report, output),
    }
}

fn export_json(report: &RunReport, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn export_csv(report: &RunReport, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "Run,Branch,SHA,Stage,Status,Duration,Failed Step,Skip Reason")?;

    for stage in &report.stages {
        writeln!(
            output,
            "{},{},{},{},{},{:.1},\"{}\",\"{}\"",
            report.run_id,
            report.branch,
            report.sha,
            stage.id,
            stage.status,
            stage.duration_secs,
            stage.failed_step().map_or("", |s| s.name.as_str()).replace('"', "\"\""),
            stage
                .skip_reason
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default()
                .replace('"', "\"\""),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::StageReport;
    use crate::runner::{SkipReason, StageStatus};
    use chrono::Utc;

    fn report() -> RunReport {
        RunReport {
            run_id: "main-1".to_string(),
            workflow: "ci".to_string(),
            branch: "main".to_string(),
            sha: "abc123".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            stages: vec![
                StageReport {
                    id: "check".to_string(),
                    name: None,
                    needs: vec![],
                    condition: "always".to_string(),
                    status: StageStatus::Succeeded,
                    skip_reason: None,
                    duration_secs: 12.0,
                    steps: vec![],
                },
                StageReport {
                    id: "build_docs".to_string(),
                    name: None,
                    needs: vec!["check".to_string()],
                    condition: "branch != main".to_string(),
                    status: StageStatus::Skipped,
                    skip_reason: Some(SkipReason::BranchPredicate {
                        condition: "branch != main".to_string(),
                    }),
                    duration_secs: 0.0,
                    steps: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_export_json() {
        let mut buffer = Vec::new();
        export_report(&report(), OutputFormat::Json, false, &mut buffer).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["branch"], "main");
        assert_eq!(value["stages"][1]["status"], "skipped");
        assert_eq!(value["stages"][1]["skip_reason"]["kind"], "branch_predicate");
    }

    #[test]
    fn test_export_csv() {
        let mut buffer = Vec::new();
        export_report(&report(), OutputFormat::Csv, false, &mut buffer).unwrap();

        let csv = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Run,Branch"));
        assert!(lines[1].contains("check,succeeded,12.0"));
        assert!(lines[2].contains("condition `branch != main` is false"));
    }
}
