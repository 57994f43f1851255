use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CirunError, Result};
use crate::report::RunReport;
use crate::runner::StageStatus;

/// Runs kept per workflow; older entries are dropped first.
const MAX_ENTRIES: usize = 100;

/// Condensed record of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: String,
    pub workflow: String,
    pub branch: String,
    pub sha: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: bool,
    pub stages: IndexMap<String, StageStatus>,
}

impl From<&RunReport> for HistoryEntry {
    fn from(report: &RunReport) -> Self {
        Self {
            run_id: report.run_id.clone(),
            workflow: report.workflow.clone(),
            branch: report.branch.clone(),
            sha: report.sha.clone(),
            started_at: report.started_at,
            finished_at: report.finished_at,
            succeeded: report.succeeded(),
            stages: report
                .stages
                .iter()
                .map(|s| (s.id.clone(), s.status))
                .collect(),
        }
    }
}

/// Per-workflow run history.
///
/// Stored as one JSON file per workflow in the platform cache directory:
/// - Linux: `~/.cache/cirun/history/{workflow}.json`
/// - macOS: `~/Library/Caches/cirun/history/{workflow}.json`
///
/// Entries are loaded into memory when opened and written back on every record.
pub struct RunHistory {
    history_file: PathBuf,
    entries: Vec<HistoryEntry>,
    enabled: bool,
}

impl RunHistory {
    /// Opens the history of `workflow` in the platform cache directory.
    ///
    /// # Errors
    ///
    /// Returns error if the cache directory cannot be determined or created.
    pub fn new(workflow: &str, enabled: bool) -> Result<Self> {
        if !enabled {
            debug!("Run history disabled");
            return Ok(Self {
                history_file: PathBuf::new(),
                entries: Vec::new(),
                enabled: false,
            });
        }

        let history_dir = dirs::cache_dir()
            .ok_or_else(|| CirunError::History("No cache directory found".into()))?
            .join("cirun")
            .join("history");

        Self::open_in(&history_dir, workflow)
    }

    /// Opens the history of `workflow` stored under `dir`.
    pub fn open_in(dir: &Path, workflow: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let history_file = dir.join(history_file_name(workflow));

        let entries = if history_file.exists() {
            fs::read_to_string(&history_file)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .inspect(|_| debug!("Loaded run history from: {}", history_file.display()))
                .unwrap_or_else(|| {
                    warn!("Failed to load run history, starting with empty history");
                    Vec::new()
                })
        } else {
            Vec::new()
        };

        Ok(Self {
            history_file,
            entries,
            enabled: true,
        })
    }

    /// Appends a finished run and saves the history to disk.
    pub fn record(&mut self, report: &RunReport) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        self.entries.push(HistoryEntry::from(report));
        if self.entries.len() > MAX_ENTRIES {
            let excess = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(..excess);
        }

        let content = serde_json::to_string(&self.entries)?;
        fs::write(&self.history_file, content)?;

        info!("Recorded run {} in {}", report.run_id, self.history_file.display());
        Ok(())
    }

    /// Most recent runs first, optionally filtered by branch.
    pub fn recent(&self, branch: Option<&str>, limit: usize) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| branch.is_none_or(|b| entry.branch == b))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// `ci` -> `ci.json`, `release/docs` -> `release-docs.json`
fn history_file_name(workflow: &str) -> String {
    let slug: String = workflow
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    slug + ".json"
}
