mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::export_report;
pub use progress::StageProgress;
use styling::{banner, dim};
pub use summary::{print_history, print_plan, print_summary};

/// Prints the `cirun` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        banner("▶ cirun"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Local CI Workflow Runner")
    );
}
