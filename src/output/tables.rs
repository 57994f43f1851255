use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::runner::{StageStatus, StepStatus};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn stage_status_cell(status: StageStatus) -> Cell {
    let cell = Cell::new(status);
    match status {
        StageStatus::Succeeded => cell.fg(TableColor::Green),
        StageStatus::Failed => cell.fg(TableColor::Red),
        StageStatus::Skipped => cell.fg(TableColor::DarkGrey),
        StageStatus::Pending | StageStatus::Running => cell.fg(TableColor::Yellow),
    }
}

pub fn step_status_cell(status: StepStatus) -> Cell {
    let cell = Cell::new(status);
    match status {
        StepStatus::Succeeded => cell.fg(TableColor::Green),
        StepStatus::Failed => cell.fg(TableColor::Red),
        StepStatus::Skipped | StepStatus::NotRun => cell.fg(TableColor::DarkGrey),
    }
}

pub fn duration_cell(seconds: f64) -> Cell {
    if seconds < 60.0 {
        Cell::new(format!("{seconds:.1}s"))
    } else {
        Cell::new(format!("{:.1}min", seconds / 60.0))
    }
}
